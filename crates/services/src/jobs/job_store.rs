use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::error::JobError;
use super::model::Job;

/// In-memory job registry keyed by job id.
///
/// Readers get cloned snapshots. Writers mutate under the per-key shard lock,
/// so a closure passed to [`JobStore::update`] must not await or call out.
#[derive(Default)]
pub struct JobStore {
    jobs: DashMap<String, Job>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) -> Result<(), JobError> {
        match self.jobs.entry(job.id.clone()) {
            Entry::Occupied(_) => Err(JobError::Duplicate(job.id)),
            Entry::Vacant(slot) => {
                slot.insert(job);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.jobs.get(id).map(|job| job.clone())
    }

    /// Applies `f` to the job. Returns `None` when the id is unknown.
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut Job) -> R) -> Option<R> {
        self.jobs.get_mut(id).map(|mut job| f(&mut job))
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
