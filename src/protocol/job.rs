//! MoleQueue method names and payload schemas.
//!
//! Every schema maps `snake_case` Rust fields to the server's `camelCase`
//! wire names with `#[serde(rename_all = "camelCase")]`.
//!
//! # Methods
//!
//! | Method | Kind | Params | Result |
//! |--------|------|--------|--------|
//! | `listQueues` | request | none | [`QueueList`] |
//! | `submitJob` | request | [`JobRequest`] | [`SubmitJobResult`] |
//! | `cancelJob` | request | [`MoleQueueIdParams`] | [`CancelJobResult`] |
//! | `lookupJob` | request | [`MoleQueueIdParams`] | [`JobInfo`] |
//! | `jobStateChanged` | notification | [`JobStateChange`] | n/a |

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

use crate::identifiers::MoleQueueId;

// ============================================================================
// Method
// ============================================================================

/// Methods understood by a MoleQueue server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// List queues and the programs configured on each.
    ListQueues,
    /// Submit a new job.
    SubmitJob,
    /// Cancel a submitted job.
    CancelJob,
    /// Fetch the current description of a job.
    LookupJob,
    /// Server notification: a job moved to a new state.
    JobStateChanged,
}

impl Method {
    /// Returns the wire name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListQueues => "listQueues",
            Self::SubmitJob => "submitJob",
            Self::CancelJob => "cancelJob",
            Self::LookupJob => "lookupJob",
            Self::JobStateChanged => "jobStateChanged",
        }
    }

    /// Looks up a method by wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "listQueues" => Some(Self::ListQueues),
            "submitJob" => Some(Self::SubmitJob),
            "cancelJob" => Some(Self::CancelJob),
            "lookupJob" => Some(Self::LookupJob),
            "jobStateChanged" => Some(Self::JobStateChanged),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// JobState
// ============================================================================

/// Lifecycle state of a job.
///
/// Serialized as its name (`"RunningLocal"`). Deserialization also accepts
/// the numeric form some servers put in job descriptions; unknown names and
/// numbers map to [`JobState::Unknown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum JobState {
    /// State could not be determined.
    Unknown,
    /// Initial state, never entered by a live job.
    #[default]
    None,
    /// Accepted by the server, input files being prepared.
    Accepted,
    /// Waiting for local execution or remote submission.
    LocalQueued,
    /// Submitted to a remote queuing system.
    Submitted,
    /// Pending execution on a remote queuing system.
    RemoteQueued,
    /// Running locally.
    RunningLocal,
    /// Running remotely.
    RunningRemote,
    /// Completed.
    Finished,
    /// Terminated at user request.
    Killed,
    /// Terminated by an error.
    Error,
}

impl JobState {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::None => "None",
            Self::Accepted => "Accepted",
            Self::LocalQueued => "LocalQueued",
            Self::Submitted => "Submitted",
            Self::RemoteQueued => "RemoteQueued",
            Self::RunningLocal => "RunningLocal",
            Self::RunningRemote => "RunningRemote",
            Self::Finished => "Finished",
            Self::Killed => "Killed",
            Self::Error => "Error",
        }
    }

    /// Parses a wire name. Unrecognized names map to [`JobState::Unknown`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "None" => Self::None,
            "Accepted" => Self::Accepted,
            "LocalQueued" => Self::LocalQueued,
            "Submitted" => Self::Submitted,
            "RemoteQueued" => Self::RemoteQueued,
            "RunningLocal" => Self::RunningLocal,
            "RunningRemote" => Self::RunningRemote,
            "Finished" => Self::Finished,
            "Killed" => Self::Killed,
            "Error" | "ErrorState" => Self::Error,
            _ => Self::Unknown,
        }
    }

    /// Maps the numeric encoding (`-1` unknown, `0` none … `9` error).
    #[must_use]
    pub const fn from_index(index: i64) -> Self {
        match index {
            0 => Self::None,
            1 => Self::Accepted,
            2 => Self::LocalQueued,
            3 => Self::Submitted,
            4 => Self::RemoteQueued,
            5 => Self::RunningLocal,
            6 => Self::RunningRemote,
            7 => Self::Finished,
            8 => Self::Killed,
            9 => Self::Error,
            _ => Self::Unknown,
        }
    }

    /// Returns `true` once the job can no longer change state.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Killed | Self::Error)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct JobStateVisitor;

        impl Visitor<'_> for JobStateVisitor {
            type Value = JobState;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a job state name or number")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<JobState, E> {
                Ok(JobState::from_name(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<JobState, E> {
                Ok(JobState::from_index(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<JobState, E> {
                Ok(i64::try_from(value).map_or(JobState::Unknown, JobState::from_index))
            }
        }

        deserializer.deserialize_any(JobStateVisitor)
    }
}

// ============================================================================
// JobRequest
// ============================================================================

/// Parameters of a `submitJob` request.
///
/// # Example
///
/// ```
/// use molequeue_client::JobRequest;
///
/// let request = JobRequest::new("TestQueue", "TestProgram")
///     .with_description("geometry optimization")
///     .with_input_as_string("water.xyz contents")
///     .with_number_of_cores(4);
/// assert_eq!(request.number_of_cores, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    /// Target queue name.
    pub queue: String,

    /// Program to run, as configured on the queue.
    pub program: String,

    /// Free-form description shown by the server.
    #[serde(default)]
    pub description: String,

    /// Path of an input file on the client machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_as_path: Option<String>,

    /// Input file contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_as_string: Option<String>,

    /// Directory to copy output into once the job finishes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_directory: Option<String>,

    /// Working directory on the server's machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_working_directory: Option<String>,

    /// Remove files from the remote host once retrieved.
    #[serde(default)]
    pub clean_remote_files: bool,

    /// Copy output back from the remote host.
    #[serde(default = "default_true")]
    pub retrieve_output: bool,

    /// Remove the local working directory once output is copied out.
    #[serde(default)]
    pub clean_local_working_directory: bool,

    /// Keep the job out of the server's job table.
    #[serde(default)]
    pub hide_from_gui: bool,

    /// Ask the server to pop up a message on state changes.
    #[serde(default = "default_true")]
    pub popup_on_state_change: bool,

    /// Processor cores requested.
    #[serde(default = "default_cores")]
    pub number_of_cores: u32,

    /// Wall time limit in minutes; `None` uses the queue default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wall_time: Option<u32>,
}

fn default_true() -> bool {
    true
}

fn default_cores() -> u32 {
    1
}

impl JobRequest {
    /// Creates a request for `program` on `queue` with server defaults.
    #[must_use]
    pub fn new(queue: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            program: program.into(),
            description: String::new(),
            input_as_path: None,
            input_as_string: None,
            output_directory: None,
            local_working_directory: None,
            clean_remote_files: false,
            retrieve_output: true,
            clean_local_working_directory: false,
            hide_from_gui: false,
            popup_on_state_change: true,
            number_of_cores: 1,
            max_wall_time: None,
        }
    }

    /// Sets the description.
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Uses the file at `path` as input.
    #[inline]
    #[must_use]
    pub fn with_input_as_path(mut self, path: impl Into<String>) -> Self {
        self.input_as_path = Some(path.into());
        self
    }

    /// Uses `contents` as the input file.
    #[inline]
    #[must_use]
    pub fn with_input_as_string(mut self, contents: impl Into<String>) -> Self {
        self.input_as_string = Some(contents.into());
        self
    }

    /// Sets the output directory.
    #[inline]
    #[must_use]
    pub fn with_output_directory(mut self, dir: impl Into<String>) -> Self {
        self.output_directory = Some(dir.into());
        self
    }

    /// Sets the requested core count.
    #[inline]
    #[must_use]
    pub fn with_number_of_cores(mut self, cores: u32) -> Self {
        self.number_of_cores = cores;
        self
    }

    /// Sets the wall time limit in minutes.
    #[inline]
    #[must_use]
    pub fn with_max_wall_time(mut self, minutes: u32) -> Self {
        self.max_wall_time = Some(minutes);
        self
    }

    /// Hides the job from the server's job table.
    #[inline]
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hide_from_gui = true;
        self
    }
}

// ============================================================================
// Results
// ============================================================================

/// Result of a successful `submitJob` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResult {
    /// Id the server assigned to the job.
    pub mole_queue_id: MoleQueueId,

    /// Server-side working directory for the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

/// Params of `cancelJob` and `lookupJob`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoleQueueIdParams {
    /// Job the request refers to.
    pub mole_queue_id: MoleQueueId,
}

/// Result of a `cancelJob` call.
///
/// Servers answer either with the bare job id or with `{"moleQueueId": id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CancelJobResult {
    /// `"result": 42`
    Bare(MoleQueueId),
    /// `"result": {"moleQueueId": 42}`
    Object(MoleQueueIdParams),
}

impl CancelJobResult {
    /// Returns the id of the canceled job.
    #[inline]
    #[must_use]
    pub const fn mole_queue_id(self) -> MoleQueueId {
        match self {
            Self::Bare(id) => id,
            Self::Object(params) => params.mole_queue_id,
        }
    }
}

/// Job description returned by `lookupJob`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    /// Server-assigned id.
    pub mole_queue_id: MoleQueueId,

    /// Current state.
    #[serde(default)]
    pub job_state: JobState,

    /// Id assigned by the remote queuing system, if submitted there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<u64>,

    /// The request as the server recorded it.
    #[serde(flatten)]
    pub request: JobRequest,
}

/// `jobStateChanged` notification params.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStateChange {
    /// Job whose state changed.
    pub mole_queue_id: MoleQueueId,

    /// Previous state.
    #[serde(default)]
    pub old_state: JobState,

    /// New state.
    pub new_state: JobState,
}

// ============================================================================
// QueueList
// ============================================================================

/// Result of a `listQueues` call: queue name → program names.
///
/// Decoding is lenient like the server's own client: a `null` or non-array
/// program list becomes an empty list and non-string entries are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QueueList(BTreeMap<String, Vec<String>>);

impl QueueList {
    /// Returns the programs configured on `queue`.
    #[must_use]
    pub fn programs(&self, queue: &str) -> Option<&[String]> {
        self.0.get(queue).map(Vec::as_slice)
    }

    /// Iterates over queue names in sorted order.
    pub fn queues(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterates over `(queue, programs)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(queue, programs)| (queue.as_str(), programs.as_slice()))
    }

    /// Returns `true` if `queue` offers `program`.
    #[must_use]
    pub fn contains(&self, queue: &str, program: &str) -> bool {
        self.programs(queue)
            .is_some_and(|programs| programs.iter().any(|p| p == program))
    }

    /// Number of queues.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no queues are configured.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, Vec<String>>> for QueueList {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        Self(map)
    }
}

impl<'de> Deserialize<'de> for QueueList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;

        let queues = raw
            .into_iter()
            .map(|(queue, programs)| {
                let programs = match programs {
                    Value::Null => Vec::new(),
                    Value::Array(items) => items
                        .into_iter()
                        .filter_map(|item| match item {
                            Value::String(program) => Some(program),
                            _ => None,
                        })
                        .collect(),
                    other => {
                        warn!(%queue, programs = %other, "Ill-formed program list");
                        Vec::new()
                    }
                };
                (queue, programs)
            })
            .collect();

        Ok(Self(queues))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_method_names() {
        for method in [
            Method::ListQueues,
            Method::SubmitJob,
            Method::CancelJob,
            Method::LookupJob,
            Method::JobStateChanged,
        ] {
            assert_eq!(Method::from_name(method.as_str()), Some(method));
        }
        assert_eq!(Method::from_name("rpcKill"), None);
        assert_eq!(Method::SubmitJob.to_string(), "submitJob");
    }

    #[test]
    fn test_job_state_names() {
        assert_eq!(
            serde_json::to_value(JobState::RunningRemote).expect("serialize"),
            json!("RunningRemote")
        );
        let state: JobState = serde_json::from_value(json!("Finished")).expect("parse");
        assert_eq!(state, JobState::Finished);
        let state: JobState = serde_json::from_value(json!("Exploded")).expect("parse");
        assert_eq!(state, JobState::Unknown);
    }

    #[test]
    fn test_job_state_numbers() {
        let state: JobState = serde_json::from_value(json!(5)).expect("parse");
        assert_eq!(state, JobState::RunningLocal);
        let state: JobState = serde_json::from_value(json!(-1)).expect("parse");
        assert_eq!(state, JobState::Unknown);
        assert!(serde_json::from_value::<JobState>(json!(true)).is_err());
    }

    #[test]
    fn test_job_state_terminal() {
        assert!(JobState::Finished.is_terminal());
        assert!(JobState::Killed.is_terminal());
        assert!(!JobState::RunningLocal.is_terminal());
    }

    #[test]
    fn test_job_request_wire_names() {
        let request = JobRequest::new("TestQueue", "TestProgram")
            .with_input_as_string("H2O")
            .with_max_wall_time(90)
            .hidden();
        let value = serde_json::to_value(&request).expect("serialize");

        assert_eq!(
            value,
            json!({
                "queue": "TestQueue",
                "program": "TestProgram",
                "description": "",
                "inputAsString": "H2O",
                "cleanRemoteFiles": false,
                "retrieveOutput": true,
                "cleanLocalWorkingDirectory": false,
                "hideFromGui": true,
                "popupOnStateChange": true,
                "numberOfCores": 1,
                "maxWallTime": 90
            })
        );
    }

    #[test]
    fn test_job_request_defaults_on_decode() {
        let request: JobRequest =
            serde_json::from_value(json!({"queue": "q", "program": "p"})).expect("parse");
        assert_eq!(request, JobRequest::new("q", "p"));
    }

    #[test]
    fn test_submit_job_result() {
        let result: SubmitJobResult = serde_json::from_value(json!({"moleQueueId": 42}))
            .expect("parse");
        assert_eq!(result.mole_queue_id, MoleQueueId::new(42));
        assert_eq!(result.working_directory, None);

        let result: SubmitJobResult = serde_json::from_value(json!({
            "moleQueueId": 7,
            "workingDirectory": "/tmp/mq/7"
        }))
        .expect("parse");
        assert_eq!(result.working_directory.as_deref(), Some("/tmp/mq/7"));
    }

    #[test]
    fn test_cancel_job_result_forms() {
        let bare: CancelJobResult = serde_json::from_value(json!(12)).expect("parse");
        let object: CancelJobResult =
            serde_json::from_value(json!({"moleQueueId": 12})).expect("parse");
        assert_eq!(bare.mole_queue_id(), MoleQueueId::new(12));
        assert_eq!(object.mole_queue_id(), MoleQueueId::new(12));
    }

    #[test]
    fn test_job_info() {
        let info: JobInfo = serde_json::from_value(json!({
            "moleQueueId": 3,
            "queueId": 1001,
            "jobState": "RunningRemote",
            "queue": "cluster",
            "program": "gamess",
            "description": "scf",
            "numberOfCores": 8
        }))
        .expect("parse");

        assert_eq!(info.mole_queue_id, MoleQueueId::new(3));
        assert_eq!(info.queue_id, Some(1001));
        assert_eq!(info.job_state, JobState::RunningRemote);
        assert_eq!(info.request.program, "gamess");
        assert_eq!(info.request.number_of_cores, 8);
        assert!(info.request.retrieve_output);
    }

    #[test]
    fn test_job_state_change() {
        let change: JobStateChange = serde_json::from_value(json!({
            "moleQueueId": 42,
            "oldState": "RunningLocal",
            "newState": "Finished"
        }))
        .expect("parse");

        assert_eq!(change.mole_queue_id, MoleQueueId::new(42));
        assert_eq!(change.old_state, JobState::RunningLocal);
        assert_eq!(change.new_state, JobState::Finished);
    }

    #[test]
    fn test_queue_list_lenient() {
        let list: QueueList = serde_json::from_value(json!({
            "local": ["sleep", "gamess", 3],
            "empty": null,
            "broken": "sleep",
            "cluster": []
        }))
        .expect("parse");

        assert_eq!(list.len(), 4);
        assert_eq!(
            list.queues().collect::<Vec<_>>(),
            ["broken", "cluster", "empty", "local"]
        );
        assert_eq!(
            list.programs("local"),
            Some(&["sleep".to_string(), "gamess".to_string()][..])
        );
        assert_eq!(list.programs("empty"), Some(&[][..]));
        assert_eq!(list.programs("broken"), Some(&[][..]));
        assert!(list.contains("local", "gamess"));
        assert!(!list.contains("cluster", "gamess"));
        assert!(!list.contains("missing", "gamess"));
    }
}
