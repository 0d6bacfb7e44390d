#![allow(dead_code)]

use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Writes a small exported library plus a valid `storage.json` into one temp dir:
///
/// ```text
/// folder#F1 Marketing
/// ├── album#A1 Campaign      image#img1 .. image#img3
/// └── folder#F2 Events
///     └── album#A2 Fair      document#doc1
/// album#A3 Logos             image#logo (4000x3000)
/// ```
pub fn library_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_library(dir.path());
    write_config(dir.path(), "acme");
    dir
}

pub fn write_config(dir: &Path, tenant: &str) {
    let config = json!({
        "storageId": 4,
        "cantoName": tenant,
        "cantoDomain": "canto.com",
        "appId": "app",
        "appSecret": "secret",
        "masterImageSize": 1600
    });
    fs::write(dir.join("storage.json"), config.to_string()).unwrap();
}

fn folder(scheme: &str, id: &str, name: &str, id_path: &str) -> serde_json::Value {
    json!({
        "id": id, "scheme": scheme, "name": name, "idPath": id_path,
        "time": "20240102030405", "created": "20230101000000"
    })
}

fn photo(i: u32) -> serde_json::Value {
    json!({
        "record": {
            "id": format!("img{}", i),
            "scheme": "image",
            "name": format!("photo-{}.jpg", i),
            "default": {
                "Size": format!("{}", 1000 * i),
                "Content Type": "image/jpeg",
                "Date modified": format!("2024010{}120000", i),
                "Date uploaded": "20231201000000"
            },
            "relatedAlbums": [{"scheme": "album", "id": "A1"}]
        }
    })
}

pub fn write_library(dir: &Path) {
    fs::create_dir_all(dir.join("files")).unwrap();
    fs::write(dir.join("files/brochure.pdf"), b"%PDF-1.7 brochure").unwrap();
    fs::write(dir.join("files/logo.png"), b"\x89PNG logo").unwrap();

    let library = json!({
        "tenant": "acme",
        "mdcBaseUrl": "https://acme.canto.com/direct/image/",
        "tree": [
            {"id": "F1", "scheme": "folder", "name": "Marketing", "children": [
                {"id": "A1", "scheme": "album", "name": "Campaign"},
                {"id": "F2", "scheme": "folder", "name": "Events", "children": [
                    {"id": "A2", "scheme": "album", "name": "Fair"}
                ]}
            ]},
            {"id": "A3", "scheme": "album", "name": "Logos"}
        ],
        "folders": [
            folder("folder", "F1", "Marketing", "F1"),
            folder("album", "A1", "Campaign", "F1/A1"),
            folder("folder", "F2", "Events", "F1/F2"),
            folder("album", "A2", "Fair", "F1/F2/A2"),
            folder("album", "A3", "Logos", "A3")
        ],
        "assets": [
            photo(1),
            photo(2),
            photo(3),
            {
                "record": {
                    "id": "doc1",
                    "scheme": "document",
                    "name": "brochure.pdf",
                    "default": {"Size": 17, "Content Type": "application/pdf"},
                    "relatedAlbums": [{"scheme": "album", "id": "A2"}]
                },
                "file": "files/brochure.pdf"
            },
            {
                "record": {
                    "id": "logo",
                    "scheme": "image",
                    "name": "logo.png",
                    "width": "4000",
                    "height": 3000,
                    "default": {"Size": 9, "Content Type": "image/png"},
                    "url": {"directUrlOriginal": "https://cdn.acme.test/logo%20final.png"},
                    "relatedAlbums": [{"scheme": "album", "id": "A3"}]
                },
                "file": "files/logo.png"
            }
        ]
    });
    fs::write(dir.join("library.json"), library.to_string()).unwrap();
}
