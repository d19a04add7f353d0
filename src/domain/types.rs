use crate::domain::ChooserValue;
use serde::Deserialize;
use std::fmt;

/// Ordered id sequence from the root's immediate child down to a node.
///
/// Node objects are rebuilt from scratch on every fetch, so paths are the
/// only identity that holds across snapshots: two nodes are the same job
/// iff their paths are elementwise equal.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct JobPath(Vec<String>);

impl JobPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, id: &str) -> Self {
        let mut ids = self.0.clone();
        ids.push(id.to_string());
        Self(ids)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Parse a `a/b/c` path as accepted by the detail endpoint. Empty
    /// segments are skipped, matching the backend's route handling.
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

impl fmt::Display for JobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// Job status as reported by the backend.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(rename = "type")]
    pub label: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_terminal: bool,
    #[serde(default)]
    pub is_bad: bool,
    #[serde(default)]
    pub is_active: bool,
}

impl Status {
    pub fn kind(&self) -> StatusKind {
        if self.is_terminal {
            if self.is_bad {
                StatusKind::Failed
            } else {
                StatusKind::Succeeded
            }
        } else if self.is_active {
            StatusKind::InProgress
        } else {
            StatusKind::Idle
        }
    }
}

/// Coarse status classification driving row and detail colors.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum StatusKind {
    Failed,
    Succeeded,
    InProgress,
    #[default]
    Idle,
}

/// Optional per-job metadata. Absent fields are simply omitted from any
/// derived presentation.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtraData {
    pub snap_name: Option<String>,
    pub cron: Option<String>,
    pub bytes_written: Option<u64>,
    pub bytes_trimmed: Option<u64>,
    pub prep_start_time: Option<f64>,
    pub prep_end_time: Option<f64>,
    pub prep_time: Option<f64>,
    pub run_start_time: Option<f64>,
    pub run_end_time: Option<f64>,
    pub run_time: Option<f64>,
}

impl ExtraData {
    pub fn is_empty(&self) -> bool {
        self.snap_name.is_none()
            && self.cron.is_none()
            && self.bytes_written.is_none()
            && self.bytes_trimmed.is_none()
            && self.prep_start_time.is_none()
            && self.prep_end_time.is_none()
            && self.prep_time.is_none()
            && self.run_start_time.is_none()
            && self.run_end_time.is_none()
            && self.run_time.is_none()
    }
}

/// A job tree node as deserialized from the backend, before path annotation.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobNodeRaw {
    pub id: String,
    pub label: String,
    pub status: Status,
    #[serde(default)]
    pub extra_data: ExtraData,
    #[serde(default)]
    pub children: Vec<JobNodeRaw>,
}

/// A job tree node with its path identity attached.
#[derive(Clone, Debug, PartialEq)]
pub struct JobNode {
    pub id: String,
    pub label: String,
    pub status: Status,
    pub extra: ExtraData,
    pub path: JobPath,
    pub children: Vec<JobNode>,
}

impl JobNode {
    /// Header line for the detail pane: `label (id)` unless they coincide.
    pub fn header(&self) -> String {
        if self.label != self.id {
            format!("{} ({})", self.label, self.id)
        } else {
            self.label.clone()
        }
    }
}

impl ChooserValue for JobNode {
    type Key = String;

    fn extract_key(&self) -> String {
        self.id.clone()
    }
}

/// Walk annotated root children down a path, one id per level.
pub fn find_node<'a>(nodes: &'a [JobNode], path: &JobPath) -> Option<&'a JobNode> {
    let mut segments = path.segments().iter();
    let first = segments.next()?;
    let mut current = nodes.iter().find(|node| node.id == *first)?;
    for segment in segments {
        current = current.children.iter().find(|node| node.id == *segment)?;
    }
    Some(current)
}

/// Annotate a freshly fetched tree with paths, top-down. The root's
/// immediate children get the single-segment path `[id]`.
pub fn annotate_paths(raw: JobNodeRaw, parent: &JobPath) -> JobNode {
    let path = parent.child(&raw.id);
    let children = raw
        .children
        .into_iter()
        .map(|child| annotate_paths(child, &path))
        .collect();
    JobNode {
        id: raw.id,
        label: raw.label,
        status: raw.status,
        extra: raw.extra_data,
        path,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, label: &str, children: Vec<JobNodeRaw>) -> JobNodeRaw {
        JobNodeRaw {
            id: id.to_string(),
            label: label.to_string(),
            status: Status {
                label: "Not Started".to_string(),
                message: String::new(),
                is_terminal: false,
                is_bad: false,
                is_active: false,
            },
            extra_data: ExtraData::default(),
            children,
        }
    }

    fn paths_of(node: &JobNode, out: &mut Vec<JobPath>) {
        out.push(node.path.clone());
        for child in &node.children {
            paths_of(child, out);
        }
    }

    #[test]
    fn root_children_get_single_segment_paths() {
        let tree = raw("pool", "Pool", vec![raw("img1", "Image 1", Vec::new())]);
        let annotated = annotate_paths(tree, &JobPath::root());
        assert_eq!(annotated.path.segments(), ["pool"]);
        assert_eq!(annotated.children[0].path.segments(), ["pool", "img1"]);
    }

    #[test]
    fn identical_id_structure_yields_equal_paths_regardless_of_content() {
        let first = raw(
            "pool",
            "Pool",
            vec![
                raw("img1", "Image 1", Vec::new()),
                raw("img2", "Image 2", Vec::new()),
            ],
        );
        let mut second = raw(
            "pool",
            "A Different Label",
            vec![
                raw("img1", "Renamed", Vec::new()),
                raw("img2", "Also Renamed", Vec::new()),
            ],
        );
        second.status.is_active = true;
        second.children[0].extra_data.bytes_written = Some(42);

        let first = annotate_paths(first, &JobPath::root());
        let second = annotate_paths(second, &JobPath::root());

        let mut first_paths = Vec::new();
        let mut second_paths = Vec::new();
        paths_of(&first, &mut first_paths);
        paths_of(&second, &mut second_paths);
        assert_eq!(first_paths, second_paths);
    }

    #[test]
    fn path_display_and_parse_round_trip() {
        let path = JobPath::root().child("pool").child("img1");
        assert_eq!(path.to_string(), "pool/img1");
        assert_eq!(JobPath::parse("pool/img1"), path);
        assert_eq!(JobPath::parse("/pool//img1/"), path);
    }

    #[test]
    fn status_kind_classification() {
        let mut status = Status {
            label: "Failed".to_string(),
            message: String::new(),
            is_terminal: true,
            is_bad: true,
            is_active: false,
        };
        assert_eq!(status.kind(), StatusKind::Failed);

        status.is_bad = false;
        assert_eq!(status.kind(), StatusKind::Succeeded);

        status.is_terminal = false;
        status.is_active = true;
        assert_eq!(status.kind(), StatusKind::InProgress);

        status.is_active = false;
        assert_eq!(status.kind(), StatusKind::Idle);
    }

    #[test]
    fn find_node_walks_the_tree_by_path() {
        let tree = annotate_paths(
            raw("pool", "Pool", vec![raw("img1", "Image 1", Vec::new())]),
            &JobPath::root(),
        );
        let nodes = vec![tree];
        assert_eq!(find_node(&nodes, &JobPath::parse("pool")).map(|node| node.id.as_str()), Some("pool"));
        assert_eq!(
            find_node(&nodes, &JobPath::parse("pool/img1")).map(|node| node.id.as_str()),
            Some("img1")
        );
        assert!(find_node(&nodes, &JobPath::parse("pool/missing")).is_none());
        assert!(find_node(&nodes, &JobPath::root()).is_none());
    }

    #[test]
    fn header_collapses_when_label_matches_id() {
        let mut node = annotate_paths(raw("pool", "Pool", Vec::new()), &JobPath::root());
        assert_eq!(node.header(), "Pool (pool)");
        node.label = "pool".to_string();
        assert_eq!(node.header(), "pool");
    }
}
