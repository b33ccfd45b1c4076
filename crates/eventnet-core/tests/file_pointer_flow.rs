//! Integration tests for file pointers (local_file → read_file).

use serde_json::json;
use tempfile::TempDir;

use eventnet_core::{
    has_file_pointer, AgentConfig, AgentId, AgentTypeRegistry, EventStore, FilePointer, Network,
    NetworkConfig, NewEvent, FILE_POINTER_KEY, SORT_INFO_KEY,
};

fn inbox() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
    std::fs::write(dir.path().join("b.txt"), "bravo").unwrap();
    std::fs::write(dir.path().join("c.txt"), "charlie").unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    dir
}

fn reader_network(dir: &TempDir, reader_user: u64) -> Network {
    let mut network = Network::in_memory();
    network
        .add_agent(
            AgentConfig::new(1, "inbox", "local_file")
                .option("mode", json!("read"))
                .option("path", json!(dir.path().to_str().unwrap())),
        )
        .expect("local_file");
    network
        .add_agent(AgentConfig::new(2, "reader", "read_file").user(reader_user))
        .expect("read_file");
    network
}

#[tokio::test]
async fn local_file_pointers_are_read_downstream() {
    let dir = inbox();
    let mut network = reader_network(&dir, 1);
    network.link(AgentId(1), AgentId(2)).unwrap();

    let pointers = network.run_check(AgentId(1)).await.expect("check");
    assert_eq!(pointers.len(), 3, "directories are skipped");
    assert!(pointers.iter().all(|e| has_file_pointer(&e.payload)));
    let first = FilePointer::from_payload(&pointers[0].payload).unwrap();
    assert_eq!(first.agent_id, AgentId(1));
    assert!(first.file.ends_with("a.txt"));

    let delivered = network.run_until_idle(5).await.unwrap();
    assert_eq!(delivered, 3);

    let read: Vec<_> = network
        .store()
        .events_from(AgentId(2), None)
        .unwrap()
        .into_iter()
        .map(|e| e.payload["data"].clone())
        .collect();
    assert_eq!(read, vec![json!("alpha"), json!("bravo"), json!("charlie")]);
}

#[tokio::test]
async fn events_order_reverses_file_listing() {
    let dir = inbox();
    let mut network = Network::in_memory();
    network
        .add_agent(
            AgentConfig::new(1, "inbox", "local_file")
                .option("path", json!(dir.path().to_str().unwrap()))
                .option("events_order", json!([["{{ file_pointer.file }}", "string", true]]))
                .option("include_sort_info", json!(true)),
        )
        .unwrap();

    let events = network.run_check(AgentId(1)).await.unwrap();
    let names: Vec<_> = events
        .iter()
        .map(|e| FilePointer::from_payload(&e.payload).unwrap().file)
        .collect();
    assert!(names[0].ends_with("c.txt"));
    assert!(names[2].ends_with("a.txt"));
    assert_eq!(events[0].payload[SORT_INFO_KEY], json!({"position": 1, "count": 3}));
}

#[tokio::test]
async fn cross_tenant_pointers_are_skipped() {
    let dir = inbox();
    let mut network = reader_network(&dir, 2);
    // Links between users are refused outright.
    assert!(network.link(AgentId(1), AgentId(2)).is_err());

    // A same-user relay forwarding another tenant's pointer gets nothing back.
    network
        .add_agent(
            AgentConfig::new(3, "relay", "de_duplication")
                .user(2)
                .option("property", json!("")),
        )
        .unwrap();
    network.link(AgentId(3), AgentId(2)).unwrap();

    let pointers = network.run_check(AgentId(1)).await.unwrap();
    for pointer in &pointers {
        network
            .store()
            .commit(AgentId(3), pointer.payload.clone().into())
            .unwrap();
    }

    network.run_until_idle(5).await.unwrap();
    assert!(network.store().events_from(AgentId(2), None).unwrap().is_empty());
}

#[tokio::test]
async fn read_file_ignores_events_without_pointers() {
    let dir = inbox();
    let mut network = reader_network(&dir, 1);
    network
        .add_agent(AgentConfig::new(3, "relay", "de_duplication").option("property", json!("")))
        .unwrap();
    network.link(AgentId(3), AgentId(2)).unwrap();

    network
        .store()
        .commit(
            AgentId(3),
            NewEvent::new(json!({"file_pointer": {"file": "x"}}).as_object().cloned().unwrap()),
        )
        .unwrap();

    assert_eq!(network.run_until_idle(5).await.unwrap(), 1);
    assert!(network.store().events_from(AgentId(2), None).unwrap().is_empty());
}

#[tokio::test]
async fn local_file_write_mode_writes_and_points_at_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let template = format!("{}/out/{{{{ name }}}}.txt", dir.path().display());
    let config = NetworkConfig::from_toml(&format!(
        r#"
        [[agents]]
        id = 1
        name = "relay"
        type = "de_duplication"
        options = {{ property = "{{{{ name }}}}" }}

        [[agents]]
        id = 2
        name = "writer"
        type = "local_file"
        options = {{ mode = "write", path = "{template}", append = "true", data = "{{{{ body }}}};" }}

        [[agents]]
        id = 3
        name = "reader"
        type = "read_file"
        options = {{ data_key = "content" }}

        [[links]]
        source = 1
        receiver = 2

        [[links]]
        source = 2
        receiver = 3
        "#
    ))
    .unwrap();
    let mut network = Network::from_config(&config, AgentTypeRegistry::with_builtins()).unwrap();

    for (name, body) in [("x", "one"), ("y", "two")] {
        network
            .store()
            .commit(
                AgentId(1),
                json!({"name": name, "body": body}).as_object().cloned().unwrap().into(),
            )
            .unwrap();
    }
    network.run_until_idle(10).await.unwrap();

    let written = std::fs::read_to_string(dir.path().join("out/x.txt")).unwrap();
    assert_eq!(written, "one;");

    let pointers = network.store().events_from(AgentId(2), None).unwrap();
    assert_eq!(pointers.len(), 2);
    assert!(pointers.iter().all(|e| e.payload.contains_key(FILE_POINTER_KEY)));

    let contents: Vec<_> = network
        .store()
        .events_from(AgentId(3), None)
        .unwrap()
        .into_iter()
        .map(|e| e.payload["content"].clone())
        .collect();
    assert_eq!(contents, vec![json!("one;"), json!("two;")]);
}
