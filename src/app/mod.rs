use crate::domain::{
    Chooser, CommitHook, ExtraData, HookError, ItemHandle, JobNode, JobPath, SelectionChange,
    Status,
};
use crate::infra::{DetailData, SnapshotEntry};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("terminal I/O error: {0}")]
    Io(#[from] io::Error),
}

/// An asynchronous detail lookup the host should dispatch for a job path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DetailRequest {
    pub path: JobPath,
}

/// What the detail pane currently shows.
#[derive(Clone, Debug, PartialEq)]
pub enum DetailContent {
    NothingSelected,
    Job(JobDetail),
}

#[derive(Clone, Debug, PartialEq)]
pub struct JobDetail {
    pub header: String,
    pub status: Status,
    pub extra: ExtraData,
    pub path: JobPath,
    /// `None` until (and unless) a detail response for this path arrives.
    pub snapshots: Option<Vec<SnapshotEntry>>,
}

/// The per-item detail pane. Remembers which path it last displayed so that
/// late responses for anything else can be dropped.
#[derive(Clone, Debug)]
pub struct DetailPanel {
    last_path: Option<JobPath>,
    content: DetailContent,
}

impl DetailPanel {
    pub fn new() -> Self {
        Self {
            last_path: None,
            content: DetailContent::NothingSelected,
        }
    }

    pub fn content(&self) -> &DetailContent {
        &self.content
    }

    pub fn last_path(&self) -> Option<&JobPath> {
        self.last_path.as_ref()
    }

    /// Display a job (or the nothing-selected state). Returns the detail
    /// lookup to dispatch; every display of a job refreshes its detail.
    pub fn show(&mut self, job: Option<&JobNode>) -> Option<DetailRequest> {
        let Some(job) = job else {
            self.last_path = None;
            self.content = DetailContent::NothingSelected;
            return None;
        };

        // A refresh of the same path keeps the snapshot table on screen
        // while the replacement lookup is in flight; a new path starts blank.
        let snapshots = if self.last_path.as_ref() == Some(&job.path) {
            match &self.content {
                DetailContent::Job(detail) => detail.snapshots.clone(),
                DetailContent::NothingSelected => None,
            }
        } else {
            None
        };

        self.content = DetailContent::Job(JobDetail {
            header: job.header(),
            status: job.status.clone(),
            extra: job.extra.clone(),
            path: job.path.clone(),
            snapshots,
        });
        self.last_path = Some(job.path.clone());
        Some(DetailRequest {
            path: job.path.clone(),
        })
    }

    /// Apply a detail response iff its path is still the displayed one.
    /// There is no request cancellation; this relevance check is the only
    /// thing keeping slow responses from clobbering the pane.
    pub fn apply_response(&mut self, path: &JobPath, data: DetailData) {
        if self.last_path.as_ref() != Some(path) {
            log::debug!("dropping stale detail response for {path}");
            return;
        }
        if let DetailContent::Job(detail) = &mut self.content {
            detail.snapshots = data.snapshot_report.map(|report| report.snapshots);
        }
    }
}

impl Default for DetailPanel {
    fn default() -> Self {
        Self::new()
    }
}

/// The two linked choosers plus the detail pane, wired by the selection
/// cascade:
///
/// - explicit job selection repopulates the images list, clears its
///   selection and shows the job's detail;
/// - refresh-driven job commits repopulate the images list but never steal
///   the display from an active image selection;
/// - an image commit with a selection shows that image's detail.
#[derive(Clone)]
pub struct Dashboard<H> {
    jobs: Chooser<JobNode, H>,
    images: Chooser<JobNode, H>,
    detail: DetailPanel,
}

struct ImagesHook<'a> {
    detail: &'a mut DetailPanel,
    requests: &'a mut Vec<DetailRequest>,
}

impl CommitHook<JobNode> for ImagesHook<'_> {
    fn commit(
        &mut self,
        change: &SelectionChange<JobNode>,
        _explicit: bool,
    ) -> Result<bool, HookError> {
        if let Some(selection) = &change.new {
            self.requests.extend(self.detail.show(Some(&selection.item)));
        }
        Ok(true)
    }
}

struct JobsHook<'a, H> {
    images: &'a mut Chooser<JobNode, H>,
    detail: &'a mut DetailPanel,
    requests: &'a mut Vec<DetailRequest>,
    jobs_empty: bool,
}

impl<H: ItemHandle<JobNode>> CommitHook<JobNode> for JobsHook<'_, H> {
    fn commit(
        &mut self,
        change: &SelectionChange<JobNode>,
        explicit: bool,
    ) -> Result<bool, HookError> {
        let item = change.new.as_ref().map(|selection| &selection.item);
        let children = item.map(|job| job.children.clone()).unwrap_or_default();
        {
            let mut hook = ImagesHook {
                detail: &mut *self.detail,
                requests: &mut *self.requests,
            };
            self.images.replace_all_values(children, &mut hook);
        }

        if explicit {
            let mut hook = ImagesHook {
                detail: &mut *self.detail,
                requests: &mut *self.requests,
            };
            self.images.set_selection_by_key(None, false, &mut hook);
            self.requests.extend(self.detail.show(item));
        } else if self.jobs_empty {
            self.requests.extend(self.detail.show(None));
        } else if let Some(job) = item {
            if self.images.selection().is_none() {
                self.requests.extend(self.detail.show(Some(job)));
            }
        }
        Ok(true)
    }
}

impl<H: ItemHandle<JobNode>> Dashboard<H> {
    pub fn new(make_handle: fn() -> H) -> Self {
        Self {
            jobs: Chooser::new(make_handle),
            images: Chooser::new(make_handle),
            detail: DetailPanel::new(),
        }
    }

    /// Feed a freshly fetched snapshot's root children into the jobs list.
    pub fn apply_snapshot(&mut self, root_children: Vec<JobNode>) -> Vec<DetailRequest> {
        let mut requests = Vec::new();
        let jobs_empty = root_children.is_empty();
        let mut hook = JobsHook {
            images: &mut self.images,
            detail: &mut self.detail,
            requests: &mut requests,
            jobs_empty,
        };
        self.jobs.replace_all_values(root_children, &mut hook);
        requests
    }

    /// User-driven job selection (or explicit clear).
    pub fn select_job(&mut self, key: Option<&String>) -> Vec<DetailRequest> {
        let mut requests = Vec::new();
        let mut hook = JobsHook {
            images: &mut self.images,
            detail: &mut self.detail,
            requests: &mut requests,
            jobs_empty: self.jobs.is_empty(),
        };
        self.jobs.set_selection_by_key(key, true, &mut hook);
        requests
    }

    /// User-driven image selection (or explicit clear).
    pub fn select_image(&mut self, key: Option<&String>) -> Vec<DetailRequest> {
        let mut requests = Vec::new();
        let mut hook = ImagesHook {
            detail: &mut self.detail,
            requests: &mut requests,
        };
        self.images.set_selection_by_key(key, true, &mut hook);
        requests
    }

    pub fn apply_detail(&mut self, path: &JobPath, data: DetailData) {
        self.detail.apply_response(path, data);
    }

    pub fn jobs(&self) -> &Chooser<JobNode, H> {
        &self.jobs
    }

    pub fn images(&self) -> &Chooser<JobNode, H> {
        &self.images
    }

    pub fn detail(&self) -> &DetailPanel {
        &self.detail
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Pane {
    Jobs,
    Images,
}

impl Pane {
    pub fn toggle(self) -> Self {
        match self {
            Self::Jobs => Self::Images,
            Self::Images => Self::Jobs,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Jobs => "Jobs",
            Self::Images => "Images",
        }
    }
}

#[derive(Clone)]
pub struct AppModel<H> {
    pub dashboard: Dashboard<H>,
    pub focus: Pane,
    /// Unix seconds from the latest snapshot's embedded server clock.
    pub server_time: Option<f64>,
    pub paused: bool,
    pub notice: Option<String>,
    pub connection_error: Option<String>,
    pub help_open: bool,
}

impl<H: ItemHandle<JobNode>> AppModel<H> {
    pub fn new(make_handle: fn() -> H) -> Self {
        Self {
            dashboard: Dashboard::new(make_handle),
            focus: Pane::Jobs,
            server_time: None,
            paused: false,
            notice: None,
            connection_error: None,
            help_open: false,
        }
    }

    pub fn with_notice(mut self, notice: Option<String>) -> Self {
        self.notice = notice;
        self
    }
}

#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AppCommand {
    None,
    Quit,
    Refresh,
    StartAll,
    PrepareAll,
    FetchDetails(Vec<DetailRequest>),
}

pub fn update<H: ItemHandle<JobNode>>(
    mut model: AppModel<H>,
    event: AppEvent,
) -> (AppModel<H>, AppCommand) {
    let AppEvent::Key(key) = event;

    if model.help_open {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            model.help_open = false;
        }
        return (model, AppCommand::None);
    }

    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return (model, AppCommand::Quit);
    }

    let command = match key.code {
        KeyCode::Char('q') => AppCommand::Quit,
        KeyCode::Char('?') => {
            model.help_open = true;
            AppCommand::None
        }
        KeyCode::Char('r') => AppCommand::Refresh,
        KeyCode::Char('s') => AppCommand::StartAll,
        KeyCode::Char('p') => AppCommand::PrepareAll,
        KeyCode::Char(' ') => {
            model.paused = !model.paused;
            AppCommand::None
        }
        KeyCode::Tab | KeyCode::BackTab => {
            model.focus = model.focus.toggle();
            AppCommand::None
        }
        KeyCode::Left => {
            model.focus = Pane::Jobs;
            AppCommand::None
        }
        KeyCode::Right => {
            model.focus = Pane::Images;
            AppCommand::None
        }
        KeyCode::Up => move_selection(&mut model, -1),
        KeyCode::Down => move_selection(&mut model, 1),
        KeyCode::Esc => escape(&mut model),
        _ => AppCommand::None,
    };
    (model, command)
}

/// Move the focused pane's selection by `delta` rows; an unselected pane
/// starts from its first (or last) row.
fn move_selection<H: ItemHandle<JobNode>>(model: &mut AppModel<H>, delta: i64) -> AppCommand {
    let chooser = match model.focus {
        Pane::Jobs => model.dashboard.jobs(),
        Pane::Images => model.dashboard.images(),
    };
    let len = chooser.len();
    if len == 0 {
        return AppCommand::None;
    }
    let next = match chooser.selected_index() {
        Some(index) => {
            let next = index as i64 + delta;
            next.clamp(0, len as i64 - 1) as usize
        }
        None => {
            if delta >= 0 {
                0
            } else {
                len - 1
            }
        }
    };
    let key = chooser.key_at(next).cloned();
    let requests = match model.focus {
        Pane::Jobs => model.dashboard.select_job(key.as_ref()),
        Pane::Images => model.dashboard.select_image(key.as_ref()),
    };
    if requests.is_empty() {
        AppCommand::None
    } else {
        AppCommand::FetchDetails(requests)
    }
}

/// Esc backs out of the images drill-down by re-selecting the current job,
/// which clears the image selection and restores the job's detail.
fn escape<H: ItemHandle<JobNode>>(model: &mut AppModel<H>) -> AppCommand {
    let requests = match model.focus {
        Pane::Images => {
            let job_key = model
                .dashboard
                .jobs()
                .selection()
                .map(|selection| selection.key.clone());
            model.focus = Pane::Jobs;
            model.dashboard.select_job(job_key.as_ref())
        }
        Pane::Jobs => model.dashboard.select_job(None),
    };
    if requests.is_empty() {
        AppCommand::None
    } else {
        AppCommand::FetchDetails(requests)
    }
}


#[cfg(test)]
mod update_tests {
    use super::*;
    use crate::domain::{ExtraData, JobPath};

    #[derive(Clone, Debug, Default)]
    struct TestHandle;

    impl ItemHandle<JobNode> for TestHandle {
        fn format_for(&mut self, _key: &String, _value: &JobNode) {}

        fn set_selected(&mut self, _selected: bool) {}
    }

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn job(id: &str, path: &str) -> JobNode {
        JobNode {
            id: id.to_string(),
            label: id.to_string(),
            status: Status {
                label: "Not Started".to_string(),
                message: String::new(),
                is_terminal: false,
                is_bad: false,
                is_active: false,
            },
            extra: ExtraData::default(),
            path: JobPath::parse(path),
            children: Vec::new(),
        }
    }

    fn model_with_jobs() -> AppModel<TestHandle> {
        let mut model = AppModel::new(TestHandle::default);
        model
            .dashboard
            .apply_snapshot(vec![job("pool1", "pool1"), job("pool2", "pool2")]);
        model
    }

    #[test]
    fn q_quits() {
        let (_model, command) = update(model_with_jobs(), key(KeyCode::Char('q')));
        assert_eq!(command, AppCommand::Quit);
    }

    #[test]
    fn ctrl_c_quits() {
        let event = AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        let (_model, command) = update(model_with_jobs(), event);
        assert_eq!(command, AppCommand::Quit);
    }

    #[test]
    fn r_requests_manual_refresh() {
        let (_model, command) = update(model_with_jobs(), key(KeyCode::Char('r')));
        assert_eq!(command, AppCommand::Refresh);
    }

    #[test]
    fn space_toggles_pause() {
        let (model, command) = update(model_with_jobs(), key(KeyCode::Char(' ')));
        assert_eq!(command, AppCommand::None);
        assert!(model.paused);
        let (model, _) = update(model, key(KeyCode::Char(' ')));
        assert!(!model.paused);
    }

    #[test]
    fn down_moves_job_selection_and_fetches_detail() {
        let model = model_with_jobs();
        assert_eq!(model.dashboard.jobs().selection().expect("selection").key, "pool1");

        let (model, command) = update(model, key(KeyCode::Down));
        assert_eq!(model.dashboard.jobs().selection().expect("selection").key, "pool2");
        let AppCommand::FetchDetails(requests) = command else {
            panic!("expected FetchDetails");
        };
        assert_eq!(requests.last().expect("request").path.to_string(), "pool2");
    }

    #[test]
    fn down_at_end_of_list_stays_put() {
        let (model, _) = update(model_with_jobs(), key(KeyCode::Down));
        let (model, command) = update(model, key(KeyCode::Down));
        assert_eq!(model.dashboard.jobs().selection().expect("selection").key, "pool2");
        // Re-selecting the same job still refreshes its detail.
        assert!(matches!(command, AppCommand::FetchDetails(_)));
    }

    #[test]
    fn tab_switches_focus() {
        let (model, _) = update(model_with_jobs(), key(KeyCode::Tab));
        assert_eq!(model.focus, Pane::Images);
        let (model, _) = update(model, key(KeyCode::Tab));
        assert_eq!(model.focus, Pane::Jobs);
    }

    #[test]
    fn help_overlay_swallows_keys_until_closed() {
        let (model, _) = update(model_with_jobs(), key(KeyCode::Char('?')));
        assert!(model.help_open);
        let (model, command) = update(model, key(KeyCode::Char('s')));
        assert_eq!(command, AppCommand::None);
        assert!(model.help_open);
        let (model, _) = update(model, key(KeyCode::Esc));
        assert!(!model.help_open);
    }

    #[test]
    fn s_and_p_trigger_backend_actions() {
        let (_model, command) = update(model_with_jobs(), key(KeyCode::Char('s')));
        assert_eq!(command, AppCommand::StartAll);
        let (_model, command) = update(model_with_jobs(), key(KeyCode::Char('p')));
        assert_eq!(command, AppCommand::PrepareAll);
    }

    #[test]
    fn esc_in_images_pane_returns_to_job_detail() {
        let mut model = model_with_jobs();
        model.dashboard.apply_snapshot(vec![{
            let mut pool = job("pool1", "pool1");
            pool.children = vec![job("img1", "pool1/img1")];
            pool
        }]);
        model.focus = Pane::Images;
        model.dashboard.select_image(Some(&"img1".to_string()));

        let (model, command) = update(model, key(KeyCode::Esc));
        assert_eq!(model.focus, Pane::Jobs);
        assert!(model.dashboard.images().selection().is_none());
        let AppCommand::FetchDetails(requests) = command else {
            panic!("expected FetchDetails");
        };
        assert_eq!(requests.last().expect("request").path.to_string(), "pool1");
    }
}
