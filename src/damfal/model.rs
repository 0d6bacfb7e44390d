//! # Domain Model: Remote Records and the Folder Tree
//!
//! Everything here is ephemeral. Records are reconstructed from repository data on every
//! request and never persisted by the driver; the only memoization lives in
//! [`crate::repository::CachedRepository`].
//!
//! ## Remote Shapes
//!
//! [`AssetRecord`] and [`FolderRecord`] mirror the JSON the DAM returns, including its
//! idiosyncratic key names (`"Date modified"`, `idPath`, `directUrlOriginal`). Numeric fields
//! arrive either as numbers or as numeric strings depending on the endpoint, so they are
//! deserialized leniently.
//!
//! ## The Folder Tree
//!
//! The DAM returns the complete container hierarchy in one call. [`FolderTree`] keeps it as an
//! explicit recursive structure (ordered children per node) with two operations the driver
//! needs:
//!
//! - [`FolderTree::subtree`]: follow a path of identifiers from the top level down and return
//!   the children of the last node.
//! - [`flatten`]: depth-first, parent before children.
//!
//! ## Remote Dates
//!
//! DAM timestamps are compact digit strings in UTC: `YYYYMMDDHHMM`, `YYYYMMDDHHMMSS` or
//! `YYYYMMDDHHMMSSmmm`. See [`parse_remote_date`].

use crate::identifier::{CombinedIdentifier, Scheme};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Accepts `42`, `"42"`, `null` or an empty string.
fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrString {
        Num(u64),
        Float(f64),
        Str(String),
    }

    match Option::<NumOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumOrString::Num(n)) => Ok(Some(n)),
        Some(NumOrString::Float(f)) if f >= 0.0 => Ok(Some(f as u64)),
        Some(NumOrString::Float(_)) => Ok(None),
        Some(NumOrString::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(NumOrString::Str(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetDefaults {
    #[serde(rename = "Size", default, deserialize_with = "lenient_u64")]
    pub size: Option<u64>,
    #[serde(rename = "Content Type", default)]
    pub content_type: Option<String>,
    #[serde(rename = "Date modified", default)]
    pub date_modified: Option<String>,
    #[serde(rename = "Date uploaded", default)]
    pub date_uploaded: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetUrls {
    #[serde(default)]
    pub direct_url_original: Option<String>,
}

/// An album or folder an asset is filed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedAlbum {
    pub scheme: Scheme,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub id: String,
    pub scheme: Scheme,
    pub name: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub width: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub height: Option<u64>,
    #[serde(rename = "default", default)]
    pub defaults: AssetDefaults,
    #[serde(default)]
    pub url: AssetUrls,
    #[serde(default)]
    pub related_albums: Vec<RelatedAlbum>,
}

impl AssetRecord {
    pub fn new(scheme: Scheme, id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            scheme,
            name: name.to_string(),
            width: None,
            height: None,
            defaults: AssetDefaults::default(),
            url: AssetUrls::default(),
            related_albums: Vec::new(),
        }
    }

    pub fn identifier(&self) -> CombinedIdentifier {
        CombinedIdentifier::new(self.scheme, self.id.as_str())
    }

    /// Extension of the asset name without the dot, empty when there is none.
    pub fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn related_folder_identifiers(&self) -> Vec<CombinedIdentifier> {
        self.related_albums
            .iter()
            .map(|album| CombinedIdentifier::new(album.scheme, album.id.as_str()))
            .collect()
    }

    /// Native pixel size, when the DAM reports both dimensions.
    pub fn native_dimensions(&self) -> Option<(u64, u64)> {
        Some((self.width?, self.height?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRecord {
    pub id: String,
    pub scheme: Scheme,
    pub name: String,
    /// Slash separated remote ids from the top level down to this container.
    pub id_path: String,
    /// Last modification, remote date format.
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
}

impl FolderRecord {
    pub fn identifier(&self) -> CombinedIdentifier {
        CombinedIdentifier::new(self.scheme, self.id.as_str())
    }

    pub fn id_path_segments(&self) -> Vec<&str> {
        self.id_path.split('/').filter(|s| !s.is_empty()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct WireNode {
    id: String,
    scheme: Scheme,
    #[serde(default)]
    name: String,
    #[serde(default)]
    children: Vec<WireNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "WireNode")]
pub struct FolderNode {
    pub identifier: CombinedIdentifier,
    pub name: String,
    pub children: Vec<FolderNode>,
}

impl From<WireNode> for FolderNode {
    fn from(wire: WireNode) -> Self {
        FolderNode {
            identifier: CombinedIdentifier::new(wire.scheme, wire.id),
            name: wire.name,
            children: wire.children.into_iter().map(FolderNode::from).collect(),
        }
    }
}

impl FolderNode {
    pub fn new(identifier: CombinedIdentifier, name: &str) -> Self {
        Self {
            identifier,
            name: name.to_string(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<FolderNode>) -> Self {
        self.children = children;
        self
    }
}

/// Snapshot of the whole container hierarchy, top level first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct FolderTree {
    pub nodes: Vec<FolderNode>,
}

impl FolderTree {
    pub fn new(nodes: Vec<FolderNode>) -> Self {
        Self { nodes }
    }

    /// Children of the node reached by following `path` from the top level.
    /// `None` when any segment is missing.
    pub fn subtree(&self, path: &[CombinedIdentifier]) -> Option<&[FolderNode]> {
        let mut level: &[FolderNode] = &self.nodes;
        for segment in path {
            let node = level.iter().find(|node| &node.identifier == segment)?;
            level = &node.children;
        }
        Some(level)
    }

    /// Sorts every level by name, the only key a tree node carries.
    pub fn sort_by_name(&mut self, direction: SortDirection) {
        fn sort_level(nodes: &mut [FolderNode], direction: SortDirection) {
            nodes.sort_by(|a, b| {
                let ord = a.name.to_lowercase().cmp(&b.name.to_lowercase());
                match direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
            for node in nodes.iter_mut() {
                sort_level(&mut node.children, direction);
            }
        }
        sort_level(&mut self.nodes, direction);
    }
}

/// Depth-first, parent before children.
pub fn flatten(nodes: &[FolderNode]) -> Vec<CombinedIdentifier> {
    let mut out = Vec::new();
    fn walk(nodes: &[FolderNode], out: &mut Vec<CombinedIdentifier>) {
        for node in nodes {
            out.push(node.identifier.clone());
            walk(&node.children, out);
        }
    }
    walk(nodes, &mut out);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    Name,
    Scheme,
    Size,
    Time,
}

impl SortBy {
    /// Maps a host sort property onto the remote sort key.
    /// Anything unrecognized sorts by time.
    pub fn from_host_key(key: &str) -> Self {
        match key {
            "name" => SortBy::Name,
            "fileext" => SortBy::Scheme,
            "size" => SortBy::Size,
            _ => SortBy::Time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn from_reverse(reverse: bool) -> Self {
        if reverse {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        }
    }
}

/// Sorts asset records the way the remote listing endpoint would.
pub fn sort_assets(records: &mut [AssetRecord], sort_by: SortBy, direction: SortDirection) {
    records.sort_by(|a, b| {
        let ord = match sort_by {
            SortBy::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortBy::Scheme => a
                .scheme
                .cmp(&b.scheme)
                .then_with(|| a.extension().cmp(&b.extension())),
            SortBy::Size => a.defaults.size.cmp(&b.defaults.size),
            SortBy::Time => remote_timestamp(a.defaults.date_modified.as_deref())
                .cmp(&remote_timestamp(b.defaults.date_modified.as_deref())),
        };
        match direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
}

/// Keyword search parameters for the DAM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetSearch {
    pub keyword: String,
    pub start: usize,
    pub limit: usize,
    pub schemes: Vec<Scheme>,
}

impl Default for AssetSearch {
    fn default() -> Self {
        Self {
            keyword: String::new(),
            start: 0,
            limit: 30,
            schemes: vec![Scheme::Image, Scheme::Document],
        }
    }
}

impl AssetSearch {
    pub const APPROVED: &'static str = "approved";

    pub fn new(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            ..Default::default()
        }
    }

    pub fn with_start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_schemes(mut self, schemes: Vec<Scheme>) -> Self {
        self.schemes = schemes;
        self
    }

    /// Only approved assets are ever searched.
    pub fn status(&self) -> &'static str {
        Self::APPROVED
    }

    pub fn matches(&self, record: &AssetRecord) -> bool {
        self.schemes.contains(&record.scheme)
            && record
                .name
                .to_lowercase()
                .contains(&self.keyword.to_lowercase())
    }
}

pub fn parse_remote_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if !matches!(value.len(), 12 | 14 | 17) || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let num = |range: std::ops::Range<usize>| -> Option<u32> { value.get(range)?.parse().ok() };

    let year = value.get(0..4)?.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, num(4..6)?, num(6..8)?)?;
    let second = if value.len() >= 14 { num(12..14)? } else { 0 };
    let milli = if value.len() == 17 { num(14..17)? } else { 0 };
    let naive = date.and_hms_milli_opt(num(8..10)?, num(10..12)?, second, milli)?;
    Some(naive.and_utc())
}

/// Unix seconds of a remote date; missing or unparseable dates count as 0.
pub fn remote_timestamp(value: Option<&str>) -> i64 {
    match value {
        None => 0,
        Some(raw) => match parse_remote_date(raw) {
            Some(date) => date.timestamp(),
            None => {
                tracing::warn!(date = raw, "unparseable remote date");
                0
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(scheme: Scheme, id: &str, name: &str, children: Vec<FolderNode>) -> FolderNode {
        FolderNode::new(CombinedIdentifier::new(scheme, id), name).with_children(children)
    }

    fn sample_tree() -> FolderTree {
        FolderTree::new(vec![
            node(
                Scheme::Folder,
                "F1",
                "Marketing",
                vec![
                    node(Scheme::Album, "A1", "Campaign", vec![]),
                    node(
                        Scheme::Folder,
                        "F2",
                        "Events",
                        vec![node(Scheme::Album, "A2", "Fair", vec![])],
                    ),
                ],
            ),
            node(Scheme::Album, "A3", "Logos", vec![]),
        ])
    }

    #[test]
    fn test_asset_record_from_remote_json() {
        let json = r#"{
            "id": "a1",
            "scheme": "image",
            "name": "beach.JPG",
            "width": "4000",
            "height": 3000,
            "default": {
                "Size": "123456",
                "Content Type": "image/jpeg",
                "Date modified": "20210528101234567",
                "Date uploaded": "20210101000000"
            },
            "url": {"directUrlOriginal": "https://cdn.example/a1%20x.jpg"},
            "relatedAlbums": [{"scheme": "album", "id": "A1"}]
        }"#;
        let record: AssetRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.native_dimensions(), Some((4000, 3000)));
        assert_eq!(record.defaults.size, Some(123456));
        assert_eq!(record.extension(), "JPG");
        assert_eq!(record.identifier().to_string(), "image#a1");
        assert_eq!(
            record.related_folder_identifiers(),
            vec![CombinedIdentifier::new(Scheme::Album, "A1")]
        );
    }

    #[test]
    fn test_asset_record_minimal_json() {
        let record: AssetRecord =
            serde_json::from_str(r#"{"id": "d1", "scheme": "document", "name": "README"}"#)
                .unwrap();
        assert_eq!(record.extension(), "");
        assert_eq!(record.native_dimensions(), None);
        assert!(record.url.direct_url_original.is_none());
    }

    #[test]
    fn test_folder_record_segments() {
        let record = FolderRecord {
            id: "A2".into(),
            scheme: Scheme::Album,
            name: "Fair".into(),
            id_path: "F1/F2/A2".into(),
            time: None,
            created: None,
        };
        assert_eq!(record.id_path_segments(), vec!["F1", "F2", "A2"]);
    }

    #[test]
    fn test_tree_from_wire_json() {
        let json = r#"[
            {"id": "F1", "scheme": "folder", "name": "Marketing", "children": [
                {"id": "A1", "scheme": "album", "name": "Campaign"}
            ]}
        ]"#;
        let tree: FolderTree = serde_json::from_str(json).unwrap();
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].children[0].identifier.to_string(), "album#A1");
    }

    #[test]
    fn test_subtree_lookup() {
        let tree = sample_tree();
        let path = vec![
            CombinedIdentifier::new(Scheme::Folder, "F1"),
            CombinedIdentifier::new(Scheme::Folder, "F2"),
        ];
        let sub = tree.subtree(&path).unwrap();
        assert_eq!(sub.len(), 1);
        assert_eq!(sub[0].name, "Fair");

        assert_eq!(tree.subtree(&[]).unwrap().len(), 2);
        let missing = vec![CombinedIdentifier::new(Scheme::Folder, "F9")];
        assert!(tree.subtree(&missing).is_none());
        // Scheme is part of the segment identity.
        let wrong_scheme = vec![CombinedIdentifier::new(Scheme::Album, "F1")];
        assert!(tree.subtree(&wrong_scheme).is_none());
    }

    #[test]
    fn test_flatten_parent_before_children() {
        let tree = sample_tree();
        let flat: Vec<String> = flatten(&tree.nodes).iter().map(|i| i.to_string()).collect();
        assert_eq!(
            flat,
            vec!["folder#F1", "album#A1", "folder#F2", "album#A2", "album#A3"]
        );
    }

    #[test]
    fn test_sort_tree_by_name() {
        let mut tree = sample_tree();
        tree.sort_by_name(SortDirection::Descending);
        assert_eq!(tree.nodes[0].name, "Marketing");
        assert_eq!(tree.nodes[1].name, "Logos");
        assert_eq!(tree.nodes[0].children[0].name, "Events");

        tree.sort_by_name(SortDirection::Ascending);
        assert_eq!(tree.nodes[0].name, "Logos");
        assert_eq!(tree.nodes[1].children[0].name, "Campaign");
    }

    #[test]
    fn test_sort_key_mapping() {
        assert_eq!(SortBy::from_host_key("name"), SortBy::Name);
        assert_eq!(SortBy::from_host_key("fileext"), SortBy::Scheme);
        assert_eq!(SortBy::from_host_key("size"), SortBy::Size);
        assert_eq!(SortBy::from_host_key("tstamp"), SortBy::Time);
        assert_eq!(SortBy::from_host_key(""), SortBy::Time);
    }

    #[test]
    fn test_parse_remote_date_formats() {
        let full = parse_remote_date("20210528101234567").unwrap();
        assert_eq!(full.to_rfc3339(), "2021-05-28T10:12:34.567+00:00");

        let seconds = parse_remote_date("20210528101234").unwrap();
        assert_eq!(seconds.timestamp(), full.timestamp());

        let minutes = parse_remote_date("202105281012").unwrap();
        assert_eq!(minutes.to_rfc3339(), "2021-05-28T10:12:00+00:00");

        assert!(parse_remote_date("2021-05-28").is_none());
        assert!(parse_remote_date("20211328101234").is_none());
        assert!(parse_remote_date("").is_none());
    }

    #[test]
    fn test_remote_timestamp_fallbacks() {
        assert_eq!(remote_timestamp(None), 0);
        assert_eq!(remote_timestamp(Some("garbage")), 0);
        assert_eq!(remote_timestamp(Some("19700101000010")), 10);
    }

    #[test]
    fn test_asset_search_defaults() {
        let search = AssetSearch::default();
        assert_eq!(search.limit, 30);
        assert_eq!(search.start, 0);
        assert_eq!(search.schemes, vec![Scheme::Image, Scheme::Document]);
        assert_eq!(search.status(), "approved");

        let beach = AssetRecord::new(Scheme::Image, "a1", "Beach.jpg");
        let clip = AssetRecord::new(Scheme::Video, "v1", "beach.mp4");
        let search = AssetSearch::new("beach");
        assert!(search.matches(&beach));
        assert!(!search.matches(&clip));
    }
}
