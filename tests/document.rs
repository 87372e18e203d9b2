//! End-to-end tests against real files.

use std::fs;

use stencil_conf::ConfigDocument;
use tempfile::TempDir;

fn path_in(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_str().unwrap().to_string()
}

#[test]
fn ini_document_full_cycle() {
    let dir = TempDir::new().unwrap();
    let path = path_in(&dir, "app.ini");
    fs::write(
        &path,
        "; connection settings\n[DefaultConnection]\nConnectionString=TestConnectionString\nProvider=SqlClient\n",
    )
    .unwrap();

    let mut doc = ConfigDocument::ini(&path).unwrap();
    doc.load().unwrap();
    assert_eq!(
        doc.get("DefaultConnection:ConnectionString"),
        Some("TestConnectionString")
    );

    doc.set("DefaultConnection:Provider", "Npgsql");
    doc.commit().unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "; connection settings\n[DefaultConnection]\nConnectionString=TestConnectionString\nProvider=Npgsql\n"
    );
}

#[test]
fn json_document_full_cycle() {
    let dir = TempDir::new().unwrap();
    let path = path_in(&dir, "app.json");
    fs::write(&path, "// generated\n{\"name\":\"test\",\"address\":{\"street\":\"S\"}}\n").unwrap();

    let mut doc = ConfigDocument::json(&path).unwrap();
    doc.load().unwrap();
    assert_eq!(doc.get("address:street"), Some("S"));

    doc.set("address:street", "T");
    doc.commit().unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "// generated\n{\"name\":\"test\",\"address\":{\"street\":\"T\"}}\n"
    );
}

#[test]
fn xml_document_full_cycle() {
    let dir = TempDir::new().unwrap();
    let path = path_in(&dir, "app.xml");
    fs::write(
        &path,
        "<?xml version=\"1.0\"?>\n<settings Port=\"8008\">\n  <Data>\n    <DefaultConnection ConnectionString=\"X\"/>\n  </Data>\n</settings>\n",
    )
    .unwrap();

    let mut doc = ConfigDocument::xml(&path).unwrap();
    doc.load().unwrap();
    assert_eq!(doc.get("Port"), Some("8008"));
    assert_eq!(doc.get("Data:DefaultConnection:ConnectionString"), Some("X"));

    doc.set("Port", "9000");
    doc.commit().unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "<?xml version=\"1.0\"?>\n<settings Port=\"9000\">\n  <Data>\n    <DefaultConnection ConnectionString=\"X\"/>\n  </Data>\n</settings>\n"
    );
}

#[test]
fn untouched_commit_reproduces_every_format_byte_for_byte() {
    let dir = TempDir::new().unwrap();

    let ini = path_in(&dir, "a.ini");
    let ini_doc = "# c\r\n[S]\r\nkey = \"v\"\r\n\r\n";
    fs::write(&ini, ini_doc).unwrap();
    let mut doc = ConfigDocument::ini(&ini).unwrap();
    doc.load().unwrap();
    doc.commit().unwrap();
    assert_eq!(fs::read_to_string(&ini).unwrap(), ini_doc);

    let json = path_in(&dir, "a.json");
    let json_doc = "{\n  /* block */\n  \"a\": 1, // line\n  \"b\": {\"c\": \"x\"}\n}\n";
    fs::write(&json, json_doc).unwrap();
    let mut doc = ConfigDocument::json(&json).unwrap();
    doc.load().unwrap();
    doc.commit().unwrap();
    assert_eq!(fs::read_to_string(&json).unwrap(), json_doc);

    let xml = path_in(&dir, "a.xml");
    let xml_doc = "<?xml version=\"1.0\"?><!-- c --><settings><a b=\"1\">t &amp; u</a></settings>";
    fs::write(&xml, xml_doc).unwrap();
    let mut doc = ConfigDocument::xml(&xml).unwrap();
    doc.load().unwrap();
    doc.commit().unwrap();
    assert_eq!(fs::read_to_string(&xml).unwrap(), xml_doc);
}

#[test]
fn fresh_generation_creates_minimal_documents() {
    let dir = TempDir::new().unwrap();

    let mut doc = ConfigDocument::ini(path_in(&dir, "f.ini")).unwrap();
    doc.set("a:b", "1");
    doc.set("c", "2");
    doc.commit().unwrap();
    assert_eq!(
        fs::read_to_string(dir.path().join("f.ini")).unwrap(),
        "a:b=1\nc=2"
    );

    let mut doc = ConfigDocument::json(path_in(&dir, "f.json")).unwrap();
    doc.set("a:b", "1");
    doc.set("c", "2");
    doc.commit().unwrap();
    assert_eq!(
        fs::read_to_string(dir.path().join("f.json")).unwrap(),
        "{\n  \"a:b\": \"1\",\n  \"c\": \"2\"\n}"
    );

    let mut doc = ConfigDocument::xml(path_in(&dir, "f.xml")).unwrap();
    doc.set("a:b", "1");
    doc.set("c", "2");
    doc.commit().unwrap();
    assert_eq!(
        fs::read_to_string(dir.path().join("f.xml")).unwrap(),
        "<settings>\n  <a Name=\"b\">1</a>\n  <c>2</c>\n</settings>"
    );
}

#[test]
fn reload_sees_committed_values() {
    let dir = TempDir::new().unwrap();
    let path = path_in(&dir, "r.ini");

    let mut doc = ConfigDocument::ini(&path).unwrap();
    doc.set("Server:Host", "localhost");
    doc.commit().unwrap();

    let mut doc = ConfigDocument::ini(&path).unwrap();
    doc.load().unwrap();
    assert_eq!(doc.get("server:host"), Some("localhost"));
}
