//! In-memory render job registry.
//!
//! One record per session, created as processing on submit and written to a
//! terminal state exactly once by the job. Pollers consume terminal records:
//! the first poll after completion sees the result and removes it.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use reel_models::{JobPoll, JobRecord, SessionId};

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<SessionId, JobRecord>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, JobRecord>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a processing record unless one is already running.
    ///
    /// A leftover terminal record for the session is replaced.
    pub fn start(&self, session: &SessionId) -> bool {
        let mut jobs = self.lock();
        if jobs.get(session).is_some_and(|r| !r.is_terminal()) {
            return false;
        }
        jobs.insert(session.clone(), JobRecord::processing(session.clone()));
        true
    }

    pub fn get(&self, session: &SessionId) -> Option<JobRecord> {
        self.lock().get(session).cloned()
    }

    /// Mark a running job completed. Returns false when there was no running job.
    pub fn complete(&self, session: &SessionId, download_url: impl Into<String>) -> bool {
        self.finish(session, |record| record.complete(download_url))
    }

    /// Mark a running job failed. Returns false when there was no running job.
    pub fn fail(&self, session: &SessionId, error: impl Into<String>) -> bool {
        self.finish(session, |record| record.fail(error))
    }

    fn finish(&self, session: &SessionId, apply: impl FnOnce(&mut JobRecord)) -> bool {
        match self.lock().get_mut(session) {
            Some(record) if !record.is_terminal() => {
                apply(record);
                true
            }
            _ => false,
        }
    }

    /// Remove and return the record if it is terminal.
    pub fn take_terminal(&self, session: &SessionId) -> Option<JobRecord> {
        let mut jobs = self.lock();
        if jobs.get(session)?.is_terminal() {
            jobs.remove(session)
        } else {
            None
        }
    }

    /// What a poller sees, consuming terminal records. `None` means no record.
    pub fn poll(&self, session: &SessionId) -> Option<JobPoll> {
        if let Some(record) = self.take_terminal(session) {
            return Some(record.to_poll());
        }
        self.lock().contains_key(session).then_some(JobPoll::Processing)
    }

    /// Jobs still running.
    pub fn active_count(&self) -> usize {
        self.lock().values().filter(|r| !r.is_terminal()).count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
