//! Runtime permissions required before scanning.
//!
//! [`PermissionGate`] is the permission surface: query a permission, or
//! request it and wait for the outcome. [`PolicyPermissions`] resolves each
//! permission from configuration; the `prompt` policy parks the request until
//! a client answers it (or the prompt times out, which counts as a refusal).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{info, warn};
use utoipa::ToSchema;

/// A named runtime permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Location access; LE scan results reveal position.
    Location,
    /// Permission to run LE scans.
    BluetoothScan,
}

impl Permission {
    /// Every known permission.
    pub const ALL: [Self; 2] = [Self::Location, Self::BluetoothScan];

    /// Machine name, as used in config and URLs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::BluetoothScan => "bluetooth_scan",
        }
    }

    /// Capitalized label for notices.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Location => "Location",
            Self::BluetoothScan => "Bluetooth scan",
        }
    }

    /// Text shown when asking again after a refusal.
    #[must_use]
    pub fn rationale(self) -> String {
        format!(
            "Permission to access your {} is required to use this app",
            self.label().to_lowercase()
        )
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PermissionError::Unknown(s.to_string()))
    }
}

/// Errors from the permission surface.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// The name matches no known permission.
    #[error("unknown permission '{0}'")]
    Unknown(String),

    /// An answer arrived for a permission nobody is asking for.
    #[error("no pending prompt for '{0}'")]
    NoPendingPrompt(Permission),
}

/// Current state of a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    /// Granted; scanning may proceed.
    Granted,
    /// Refused.
    Denied,
    /// Never asked.
    Undetermined,
}

/// Result of a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOutcome {
    /// The permission was granted.
    Granted,
    /// The permission was refused or the prompt expired.
    Denied,
}

impl PermissionOutcome {
    /// Returns `true` for [`PermissionOutcome::Granted`].
    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// How a permission is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PermissionPolicy {
    /// Always granted.
    #[default]
    Grant,
    /// Always refused.
    Deny,
    /// Ask a client and wait for the answer.
    Prompt,
}

/// A request waiting for a client answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PendingPrompt {
    /// Permission being requested.
    pub permission: Permission,

    /// Explanation shown because the permission was refused before.
    pub rationale: Option<String>,
}

/// The permission surface.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Current state without prompting.
    async fn status(&self, permission: Permission) -> PermissionStatus;

    /// Ask for `permission`, waiting for the user if needed.
    async fn request(&self, permission: Permission) -> PermissionOutcome;
}

struct Prompt {
    id: u64,
    rationale: Option<String>,
    reply: oneshot::Sender<bool>,
}

#[derive(Default)]
struct PolicyState {
    decided: HashMap<Permission, bool>,
    pending: HashMap<Permission, Prompt>,
    next_id: u64,
}

/// Config-driven permission gate.
pub struct PolicyPermissions {
    policies: HashMap<Permission, PermissionPolicy>,
    prompt_timeout: Duration,
    state: Mutex<PolicyState>,
}

impl PolicyPermissions {
    /// Gate using `policies`; permissions not listed are granted.
    #[must_use]
    pub fn new(policies: HashMap<Permission, PermissionPolicy>, prompt_timeout: Duration) -> Self {
        Self {
            policies,
            prompt_timeout,
            state: Mutex::new(PolicyState::default()),
        }
    }

    /// Gate that grants everything.
    #[must_use]
    pub fn allow_all() -> Self {
        Self::new(HashMap::new(), Duration::from_secs(30))
    }

    /// Policy configured for `permission`.
    #[must_use]
    pub fn policy(&self, permission: Permission) -> PermissionPolicy {
        self.policies.get(&permission).copied().unwrap_or_default()
    }

    /// Prompts currently waiting for an answer.
    #[must_use]
    pub fn pending(&self) -> Vec<PendingPrompt> {
        let state = self.lock();
        let mut prompts: Vec<PendingPrompt> = state
            .pending
            .iter()
            .map(|(permission, prompt)| PendingPrompt {
                permission: *permission,
                rationale: prompt.rationale.clone(),
            })
            .collect();
        prompts.sort_by_key(|p| p.permission.as_str());
        prompts
    }

    /// Whether a prompt for `permission` is waiting.
    #[must_use]
    pub fn is_pending(&self, permission: Permission) -> bool {
        self.lock().pending.contains_key(&permission)
    }

    /// Answer the pending prompt for `permission`.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError::NoPendingPrompt`] if nothing is waiting.
    pub fn answer(&self, permission: Permission, granted: bool) -> Result<(), PermissionError> {
        let prompt = {
            let mut state = self.lock();
            let prompt = state
                .pending
                .remove(&permission)
                .ok_or(PermissionError::NoPendingPrompt(permission))?;
            state.decided.insert(permission, granted);
            prompt
        };

        info!(%permission, granted, "Permission prompt answered");
        // The requester may have timed out in the meantime.
        let _ = prompt.reply.send(granted);
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PolicyState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Drop the prompt for `permission` if it is still prompt `id`.
    fn expire(&self, permission: Permission, id: u64) -> bool {
        let mut state = self.lock();
        if state.pending.get(&permission).is_some_and(|p| p.id == id) {
            state.pending.remove(&permission);
            true
        } else {
            false
        }
    }

    async fn prompt(&self, permission: Permission) -> PermissionOutcome {
        let (id, receiver) = {
            let mut state = self.lock();
            let rationale = (state.decided.get(&permission) == Some(&false))
                .then(|| permission.rationale());
            let id = state.next_id;
            state.next_id += 1;
            let (reply, receiver) = oneshot::channel();
            // A newer request replaces an unanswered one; the old requester sees Denied.
            state.pending.insert(
                permission,
                Prompt {
                    id,
                    rationale,
                    reply,
                },
            );
            (id, receiver)
        };

        info!(%permission, "Waiting for permission prompt answer");
        match tokio::time::timeout(self.prompt_timeout, receiver).await {
            Ok(Ok(true)) => PermissionOutcome::Granted,
            Ok(Ok(false) | Err(_)) => PermissionOutcome::Denied,
            Err(_) => {
                warn!(%permission, timeout = ?self.prompt_timeout, "Permission prompt expired");
                self.expire(permission, id);
                PermissionOutcome::Denied
            }
        }
    }
}

#[async_trait]
impl PermissionGate for PolicyPermissions {
    async fn status(&self, permission: Permission) -> PermissionStatus {
        match self.policy(permission) {
            PermissionPolicy::Grant => PermissionStatus::Granted,
            PermissionPolicy::Deny => PermissionStatus::Denied,
            PermissionPolicy::Prompt => match self.lock().decided.get(&permission) {
                Some(true) => PermissionStatus::Granted,
                Some(false) => PermissionStatus::Denied,
                None => PermissionStatus::Undetermined,
            },
        }
    }

    async fn request(&self, permission: Permission) -> PermissionOutcome {
        match self.status(permission).await {
            PermissionStatus::Granted => PermissionOutcome::Granted,
            _ if self.policy(permission) == PermissionPolicy::Deny => PermissionOutcome::Denied,
            _ => self.prompt(permission).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn prompting(timeout: Duration) -> Arc<PolicyPermissions> {
        let policies = HashMap::from([(Permission::Location, PermissionPolicy::Prompt)]);
        Arc::new(PolicyPermissions::new(policies, timeout))
    }

    async fn wait_for_prompt(gate: &PolicyPermissions) -> PendingPrompt {
        for _ in 0..100 {
            if let Some(prompt) = gate.pending().into_iter().next() {
                return prompt;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("prompt never appeared");
    }

    #[test]
    fn test_parse_permission() {
        assert_eq!("location".parse::<Permission>().unwrap(), Permission::Location);
        assert_eq!(
            "BLUETOOTH_SCAN".parse::<Permission>().unwrap(),
            Permission::BluetoothScan
        );
        assert!(matches!(
            "camera".parse::<Permission>(),
            Err(PermissionError::Unknown(_))
        ));
    }

    #[tokio::test]
    async fn test_unlisted_permission_is_granted() {
        let gate = PolicyPermissions::allow_all();
        assert_eq!(gate.status(Permission::Location).await, PermissionStatus::Granted);
        assert_eq!(gate.request(Permission::Location).await, PermissionOutcome::Granted);
    }

    #[tokio::test]
    async fn test_deny_policy_never_prompts() {
        let policies = HashMap::from([(Permission::Location, PermissionPolicy::Deny)]);
        let gate = PolicyPermissions::new(policies, Duration::from_secs(1));

        assert_eq!(gate.request(Permission::Location).await, PermissionOutcome::Denied);
        assert!(gate.pending().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_answered_asynchronously() {
        let gate = prompting(Duration::from_secs(5));
        assert_eq!(
            gate.status(Permission::Location).await,
            PermissionStatus::Undetermined
        );

        let requester = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.request(Permission::Location).await })
        };

        let prompt = wait_for_prompt(&gate).await;
        assert_eq!(prompt.permission, Permission::Location);
        assert_eq!(prompt.rationale, None);

        gate.answer(Permission::Location, true).unwrap();
        assert_eq!(requester.await.unwrap(), PermissionOutcome::Granted);
        assert_eq!(gate.status(Permission::Location).await, PermissionStatus::Granted);
    }

    #[tokio::test]
    async fn test_second_prompt_after_refusal_has_rationale() {
        let gate = prompting(Duration::from_secs(5));

        let first = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.request(Permission::Location).await })
        };
        wait_for_prompt(&gate).await;
        gate.answer(Permission::Location, false).unwrap();
        assert_eq!(first.await.unwrap(), PermissionOutcome::Denied);

        let second = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.request(Permission::Location).await })
        };
        let prompt = wait_for_prompt(&gate).await;
        assert_eq!(
            prompt.rationale.as_deref(),
            Some("Permission to access your location is required to use this app")
        );
        gate.answer(Permission::Location, true).unwrap();
        assert_eq!(second.await.unwrap(), PermissionOutcome::Granted);
    }

    #[tokio::test]
    async fn test_unanswered_prompt_times_out_as_denied() {
        let gate = prompting(Duration::from_millis(20));

        assert_eq!(gate.request(Permission::Location).await, PermissionOutcome::Denied);
        assert!(gate.pending().is_empty());
    }

    #[tokio::test]
    async fn test_stale_expiry_keeps_replacement_prompt() {
        let gate = prompting(Duration::from_secs(5));

        let first = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.request(Permission::Location).await })
        };
        wait_for_prompt(&gate).await;
        let stale = gate.lock().pending[&Permission::Location].id;

        let second = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.request(Permission::Location).await })
        };
        // Replacing the prompt releases the first requester.
        assert_eq!(first.await.unwrap(), PermissionOutcome::Denied);
        assert!(gate.is_pending(Permission::Location));

        assert!(!gate.expire(Permission::Location, stale));
        assert!(gate.is_pending(Permission::Location));

        gate.answer(Permission::Location, true).unwrap();
        assert_eq!(second.await.unwrap(), PermissionOutcome::Granted);
    }

    #[test]
    fn test_answer_without_prompt_fails() {
        let gate = prompting(Duration::from_secs(1));
        assert!(matches!(
            gate.answer(Permission::Location, true),
            Err(PermissionError::NoPendingPrompt(Permission::Location))
        ));
    }
}
