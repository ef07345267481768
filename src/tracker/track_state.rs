/// Lifecycle of a tracked bin.
///
/// `New -> Tracked -> (Tracked <-> Stale) -> Removed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Constructed but not yet in a list
    #[default]
    New,
    /// Matched by a detection in the current or most recent frame
    Tracked,
    /// A frame passed without a matching detection
    Stale,
    /// Confidence or miss budget exhausted; about to be dropped from the list
    Removed,
}
