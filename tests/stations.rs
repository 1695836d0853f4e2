use std::fs;
use std::sync::Arc;

use netradio::{EngineConfig, NullOutput, RadioEngine, StationRecord};

#[test]
fn engine_loads_and_persists_stations() {
    let dir = tempfile::tempdir().unwrap();
    let stations_file = dir.path().join("radio_stations.txt");
    fs::write(&stations_file, "Jazz|http://jazz.example/live|Jazz|Smooth\nbroken line\n").unwrap();

    let catalog_dir = dir.path().join("stations");
    fs::create_dir(&catalog_dir).unwrap();
    fs::write(
        catalog_dir.join("de.json"),
        r#"{"country":"Germany","code":"DE","stations":[{"name":"Eins","url":"http://eins.example/"}]}"#,
    )
    .unwrap();

    let config = EngineConfig {
        stations_file: Some(stations_file.clone()),
        catalog_dirs: vec![catalog_dir],
        ..EngineConfig::default()
    };
    let mut engine = RadioEngine::init(config.clone(), Arc::new(NullOutput::new())).unwrap();
    assert_eq!(engine.stations().len(), 1);
    assert_eq!(engine.stations().stations()[0].slogan, "Smooth");
    assert_eq!(engine.catalog().station_count("DE"), 1);

    let eins = engine.catalog().stations_for("DE").next().unwrap().clone();
    engine.stations_mut().add(StationRecord::from(&eins)).unwrap();
    engine.shutdown().unwrap();
    drop(engine);

    let engine = RadioEngine::init(config, Arc::new(NullOutput::new())).unwrap();
    assert_eq!(engine.stations().len(), 2);
    assert!(engine.stations().contains_url("http://eins.example/"));
}
