//! External device selection

use async_trait::async_trait;

/// Picks one device when discovery finds more than one
///
/// Candidates are presented as `"name (transport)"` labels. Returning `None`
/// declines the selection.
#[async_trait]
pub trait DeviceSelector: Send + Sync {
    async fn select(&self, candidates: &[String]) -> Option<usize>;
}

/// Always picks the first candidate
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstDeviceSelector;

#[async_trait]
impl DeviceSelector for FirstDeviceSelector {
    async fn select(&self, candidates: &[String]) -> Option<usize> {
        (!candidates.is_empty()).then_some(0)
    }
}

/// Always declines
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclineSelector;

#[async_trait]
impl DeviceSelector for DeclineSelector {
    async fn select(&self, _candidates: &[String]) -> Option<usize> {
        None
    }
}
