mod counter;
mod frozen;
mod lww_register;
mod sync;

use meld_sys::mock;

/// Starts the test from a pristine replica: fresh host, empty recorder.
pub(crate) fn fresh_replica() {
    mock::reset();
    meld_sdk::delta::reset();
}

/// Replays a replica's committed deltas onto the current replica.
pub(crate) fn replicate(commits: &[mock::Commit]) {
    for commit in commits {
        mock::apply_artifact(&commit.artifact).expect("peer artifact must apply");
    }
}
