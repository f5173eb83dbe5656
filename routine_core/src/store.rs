//! Catalog data access with a file-locked local cache.
//!
//! Records come from a `DocumentSource` (the remote document store, or a
//! directory standing in for it). Each collection is cached locally as the
//! raw JSON the source returned; a missing or corrupt cache entry is
//! refreshed from the source. Request-scoped catalogs are assembled by
//! fetching the needed collections concurrently and failing the whole
//! request if any fetch fails or any requested id is absent.

use crate::request::{StretchWorkoutRoute, WorkoutRoute};
use crate::types::*;
use crate::{Error, FetchFailures, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::thread::ScopedJoinHandle;
use tempfile::NamedTempFile;

/// A catalog collection in the document store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Exercises,
    DynamicStretches,
    StaticStretches,
    ImageSets,
    Transitions,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Exercises,
        Collection::DynamicStretches,
        Collection::StaticStretches,
        Collection::ImageSets,
        Collection::Transitions,
    ];

    /// Collection name in the document store
    pub fn key(self) -> &'static str {
        match self {
            Collection::Exercises => "exercise",
            Collection::DynamicStretches => "dynamicstretch",
            Collection::StaticStretches => "staticstretch",
            Collection::ImageSets => "imageset",
            Collection::Transitions => "transition",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.json", self.key())
    }
}

/// Upstream source of catalog documents
pub trait DocumentSource: Send + Sync {
    /// Raw JSON text of a whole collection
    fn load(&self, collection: Collection) -> Result<String>;
}

/// Reads `<root>/<collection>.json`
#[derive(Clone, Debug)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DocumentSource for DirectorySource {
    fn load(&self, collection: Collection) -> Result<String> {
        let path = self.root.join(collection.file_name());
        std::fs::read_to_string(&path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })
    }
}

/// Catalog access through an optional local cache
pub struct CatalogStore<S = DirectorySource> {
    upstream: S,
    cache_dir: Option<PathBuf>,
}

impl<S: DocumentSource> CatalogStore<S> {
    /// Store without a cache; every fetch goes upstream
    pub fn new(upstream: S) -> Self {
        Self {
            upstream,
            cache_dir: None,
        }
    }

    pub fn with_cache(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }

    fn cache_path(&self, collection: Collection) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join(collection.file_name()))
    }

    /// One whole collection, from cache when possible
    pub fn collection<T: DeserializeOwned>(&self, collection: Collection) -> Result<T> {
        let cache_path = self.cache_path(collection);

        if let Some(path) = &cache_path {
            if let Some(value) = read_cached(path) {
                tracing::debug!("Cache hit for {} collection", collection.key());
                return Ok(value);
            }
        }

        let text = self.upstream.load(collection)?;
        let value: T = serde_json::from_str(&text).map_err(|e| {
            Error::CatalogValidation(format!("{} collection: {}", collection.key(), e))
        })?;

        if let Some(path) = &cache_path {
            match write_cache(path, &text) {
                Ok(()) => tracing::info!("Refreshed cached {} collection", collection.key()),
                Err(e) => tracing::warn!(
                    "Failed to cache {} collection at {:?}: {}",
                    collection.key(),
                    path,
                    e
                ),
            }
        }

        Ok(value)
    }

    /// Remove every cached collection, returning how many were removed
    pub fn clear_cache(&self) -> Result<usize> {
        let mut removed = 0;
        for collection in Collection::ALL {
            if let Some(path) = self.cache_path(collection) {
                if path.exists() {
                    std::fs::remove_file(&path)?;
                    removed += 1;
                }
            }
        }
        tracing::info!("Cleared {} cached collection(s)", removed);
        Ok(removed)
    }

    /// Every record of every collection
    pub fn fetch_all(&self) -> Result<Catalog> {
        let fetched = self.fan_out(true)?;
        Ok(Catalog {
            image_sets: index(fetched.image_sets, |r| &r.id),
            exercises: index(fetched.exercises, |r| &r.id),
            dynamics: index(fetched.dynamics, |r| &r.id),
            statics: index(fetched.statics, |r| &r.id),
            transitions: fetched.transitions,
        })
    }

    /// Records needed by a workout request
    pub fn fetch_for_workout(&self, route: &WorkoutRoute) -> Result<Catalog> {
        let fetched = self.fan_out(true)?;
        let mut missing = Vec::new();

        let catalog = Catalog {
            image_sets: index(fetched.image_sets, |r| &r.id),
            exercises: pick(
                fetched.exercises,
                &route.exercise_ids(),
                |r| &r.id,
                "exercise",
                &mut missing,
            ),
            dynamics: pick(fetched.dynamics, &route.dynamics, |r| &r.id, "dynamic stretch", &mut missing),
            statics: pick(fetched.statics, &route.statics, |r| &r.id, "static stretch", &mut missing),
            transitions: fetched.transitions,
        };

        if catalog.transitions.is_none() {
            missing.push("transition matrix".to_string());
        }
        missing.extend(missing_frames(&catalog));
        report_missing(missing)?;
        Ok(catalog)
    }

    /// Records needed by a stretch routine request
    pub fn fetch_for_stretch(&self, route: &StretchWorkoutRoute) -> Result<Catalog> {
        let fetched = self.fan_out(false)?;
        let mut missing = Vec::new();

        let catalog = Catalog {
            image_sets: index(fetched.image_sets, |r| &r.id),
            dynamics: pick(fetched.dynamics, &route.dynamics, |r| &r.id, "dynamic stretch", &mut missing),
            statics: pick(fetched.statics, &route.statics, |r| &r.id, "static stretch", &mut missing),
            ..Default::default()
        };

        missing.extend(missing_frames(&catalog));
        report_missing(missing)?;
        Ok(catalog)
    }

    /// Fetch the needed collections concurrently, collecting every failure
    fn fan_out(&self, with_exercises: bool) -> Result<Fetched> {
        let mut failures = Vec::new();

        let fetched = std::thread::scope(|s| {
            let exercises = with_exercises
                .then(|| s.spawn(|| self.collection::<Vec<Exercise>>(Collection::Exercises)));
            let transitions = with_exercises
                .then(|| s.spawn(|| self.collection::<TransitionMatrix>(Collection::Transitions)));
            let dynamics = s.spawn(|| self.collection::<Vec<DynamicStr>>(Collection::DynamicStretches));
            let statics = s.spawn(|| self.collection::<Vec<StaticStr>>(Collection::StaticStretches));
            let image_sets = s.spawn(|| self.collection::<Vec<ImageSet>>(Collection::ImageSets));

            Fetched {
                exercises: exercises
                    .and_then(|h| settle(h, &mut failures))
                    .unwrap_or_default(),
                dynamics: settle(dynamics, &mut failures).unwrap_or_default(),
                statics: settle(statics, &mut failures).unwrap_or_default(),
                image_sets: settle(image_sets, &mut failures).unwrap_or_default(),
                transitions: transitions.and_then(|h| settle(h, &mut failures)),
            }
        });

        if failures.is_empty() {
            Ok(fetched)
        } else {
            tracing::warn!("{} catalog fetch(es) failed", failures.len());
            Err(Error::Fetch(FetchFailures(failures)))
        }
    }
}

impl CatalogStore<DirectorySource> {
    /// Directory-backed store, cached under `cache_dir` unless `None`
    pub fn open(catalog_dir: &Path, cache_dir: Option<&Path>) -> Self {
        let store = Self::new(DirectorySource::new(catalog_dir));
        match cache_dir {
            Some(dir) => store.with_cache(dir),
            None => store,
        }
    }
}

#[derive(Default)]
struct Fetched {
    exercises: Vec<Exercise>,
    dynamics: Vec<DynamicStr>,
    statics: Vec<StaticStr>,
    image_sets: Vec<ImageSet>,
    transitions: Option<TransitionMatrix>,
}

fn settle<T>(handle: ScopedJoinHandle<'_, Result<T>>, failures: &mut Vec<Error>) -> Option<T> {
    match handle.join() {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            failures.push(e);
            None
        }
        Err(_) => {
            failures.push(Error::Other("catalog fetch task panicked".into()));
            None
        }
    }
}

fn index<T>(records: Vec<T>, id: impl Fn(&T) -> &String) -> HashMap<String, T> {
    records.into_iter().map(|r| (id(&r).clone(), r)).collect()
}

fn pick<T>(
    records: Vec<T>,
    wanted: &[String],
    id: impl Fn(&T) -> &String,
    kind: &str,
    missing: &mut Vec<String>,
) -> HashMap<String, T> {
    let mut all = index(records, id);
    let mut picked = HashMap::new();
    for want in wanted {
        if picked.contains_key(want) {
            continue;
        }
        match all.remove(want) {
            Some(record) => {
                picked.insert(want.clone(), record);
            }
            None => missing.push(format!("{} '{}'", kind, want)),
        }
    }
    picked
}

fn missing_frames(catalog: &Catalog) -> impl Iterator<Item = String> {
    catalog
        .missing_image_sets()
        .into_iter()
        .map(|id| format!("image set '{}'", id))
}

fn report_missing(missing: Vec<String>) -> Result<()> {
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::IncompleteCatalog(format!(
            "missing {}",
            missing.join(", ")
        )))
    }
}

/// Parse a cache entry under a shared lock; `None` means refetch
fn read_cached<T: DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.exists() {
        return None;
    }

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!("Unable to open cache entry {:?}: {}. Refetching.", path, e);
            return None;
        }
    };

    if let Err(e) = file.lock_shared() {
        tracing::warn!("Unable to lock cache entry {:?}: {}. Refetching.", path, e);
        return None;
    }

    let mut contents = String::new();
    let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
    let _ = file.unlock();
    if let Err(e) = read {
        tracing::warn!("Failed to read cache entry {:?}: {}. Refetching.", path, e);
        return None;
    }

    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Corrupt cache entry {:?}: {}. Refetching.", path, e);
            None
        }
    }
}

/// Atomically replace a cache entry
fn write_cache(path: &Path, contents: &str) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::Other, "cache path missing parent")
    })?;
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        writer.write_all(contents.as_bytes())?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;

    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sample_catalog;
    use crate::request::tests::{round, stretch_times};
    use crate::RoundKind;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory source serving the sample catalog, with injectable failures
    struct FakeSource {
        documents: HashMap<Collection, String>,
        failing: HashSet<Collection>,
        loads: AtomicUsize,
    }

    impl FakeSource {
        fn new() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            sample_catalog().write_to_dir(temp_dir.path()).unwrap();
            let documents = Collection::ALL
                .iter()
                .map(|c| {
                    let text = std::fs::read_to_string(temp_dir.path().join(c.file_name())).unwrap();
                    (*c, text)
                })
                .collect();
            Self {
                documents,
                failing: HashSet::new(),
                loads: AtomicUsize::new(0),
            }
        }

        fn without_image_sets(mut self, ids: &[&str]) -> Self {
            let doc = &self.documents[&Collection::ImageSets];
            let mut sets: Vec<ImageSet> = serde_json::from_str(doc).unwrap();
            sets.retain(|s| !ids.contains(&s.id.as_str()));
            self.documents
                .insert(Collection::ImageSets, serde_json::to_string(&sets).unwrap());
            self
        }

        fn failing(mut self, collection: Collection) -> Self {
            self.failing.insert(collection);
            self
        }
    }

    impl DocumentSource for FakeSource {
        fn load(&self, collection: Collection) -> Result<String> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(&collection) {
                return Err(Error::Other(format!("{} unavailable", collection.key())));
            }
            Ok(self.documents[&collection].clone())
        }
    }

    fn workout_route(exercise_ids: &[&str]) -> WorkoutRoute {
        WorkoutRoute {
            id: None,
            resolution: None,
            dynamics: vec!["arm-circles".into(), "leg-swings".into()],
            statics: vec!["hamstring".into()],
            stretch_times: stretch_times(),
            difficulty: 0,
            rounds: vec![round(RoundKind::Combo, exercise_ids, &vec![4.0; exercise_ids.len()])],
        }
    }

    #[test]
    fn test_fetch_for_workout_filters_to_requested_ids() {
        let store = CatalogStore::new(FakeSource::new());
        let catalog = store
            .fetch_for_workout(&workout_route(&["pushup", "squat"]))
            .unwrap();

        assert_eq!(catalog.exercises.len(), 2);
        assert!(catalog.exercises.contains_key("squat"));
        assert_eq!(catalog.dynamics.len(), 2);
        assert_eq!(catalog.statics.len(), 1);
        assert!(catalog.transitions.is_some());
        assert_eq!(store.upstream.loads.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_fetch_for_stretch_skips_exercises() {
        let store = CatalogStore::new(FakeSource::new().failing(Collection::Exercises));
        let route = StretchWorkoutRoute {
            id: None,
            resolution: None,
            dynamics: vec!["torso-twist".into()],
            statics: vec!["quad-stretch".into()],
            stretch_times: stretch_times(),
        };

        let catalog = store.fetch_for_stretch(&route).unwrap();
        assert!(catalog.exercises.is_empty());
        assert!(catalog.transitions.is_none());
        assert_eq!(store.upstream.loads.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_every_fetch_failure_is_reported() {
        let source = FakeSource::new()
            .failing(Collection::Exercises)
            .failing(Collection::Transitions);
        let store = CatalogStore::new(source);

        let err = store.fetch_for_workout(&workout_route(&["pushup"])).unwrap_err();
        match &err {
            Error::Fetch(failures) => assert_eq!(failures.len(), 2),
            other => panic!("expected fetch failure, got {:?}", other),
        }
        let msg = err.to_string();
        assert!(msg.contains("exercise unavailable"));
        assert!(msg.contains("transition unavailable"));
    }

    #[test]
    fn test_missing_ids_reported_together() {
        let store = CatalogStore::new(FakeSource::new());
        let mut route = workout_route(&["pushup", "handstand", "pistol"]);
        route.statics.push("pigeon".into());

        let msg = store.fetch_for_workout(&route).unwrap_err().to_string();
        assert!(msg.contains("exercise 'handstand'"));
        assert!(msg.contains("exercise 'pistol'"));
        assert!(msg.contains("static stretch 'pigeon'"));
    }

    #[test]
    fn test_missing_image_sets_reported_with_ids() {
        let source = FakeSource::new().without_image_sets(&["plank-low", "hamstring-fold"]);
        let store = CatalogStore::new(source);
        let mut route = workout_route(&["pushup", "pistol"]);
        route.dynamics.push("windmill".into());

        let err = store.fetch_for_workout(&route).unwrap_err();
        assert!(matches!(err, Error::IncompleteCatalog(_)));
        let msg = err.to_string();
        assert!(msg.contains("exercise 'pistol'"));
        assert!(msg.contains("dynamic stretch 'windmill'"));
        assert!(msg.contains("image set 'plank-low'"));
        assert!(msg.contains("image set 'hamstring-fold'"));
    }

    #[test]
    fn test_stretch_fetch_ignores_image_sets_it_does_not_use() {
        let source = FakeSource::new().without_image_sets(&["plank-low"]);
        let store = CatalogStore::new(source);
        let route = StretchWorkoutRoute {
            id: None,
            resolution: None,
            dynamics: vec!["torso-twist".into()],
            statics: vec!["quad-stretch".into()],
            stretch_times: stretch_times(),
        };
        assert!(store.fetch_for_stretch(&route).is_ok());
    }

    #[test]
    fn test_cache_serves_repeat_fetches() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(FakeSource::new()).with_cache(temp_dir.path());
        let route = workout_route(&["pushup"]);

        store.fetch_for_workout(&route).unwrap();
        store.fetch_for_workout(&route).unwrap();
        assert_eq!(store.upstream.loads.load(Ordering::SeqCst), 5);

        for collection in Collection::ALL {
            assert!(temp_dir.path().join(collection.file_name()).exists());
        }
    }

    #[test]
    fn test_corrupt_cache_entry_is_refetched() {
        crate::logging::init_test();
        let temp_dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(FakeSource::new()).with_cache(temp_dir.path());

        let first: Vec<Exercise> = store.collection(Collection::Exercises).unwrap();
        let path = temp_dir.path().join(Collection::Exercises.file_name());
        std::fs::write(&path, "{ not json").unwrap();

        let second: Vec<Exercise> = store.collection(Collection::Exercises).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.upstream.loads.load(Ordering::SeqCst), 2);

        let repaired: Vec<Exercise> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(repaired.len(), first.len());
    }

    #[test]
    fn test_clear_cache() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(FakeSource::new()).with_cache(temp_dir.path());

        store.fetch_for_workout(&workout_route(&["squat"])).unwrap();
        assert_eq!(store.clear_cache().unwrap(), 5);
        assert_eq!(store.clear_cache().unwrap(), 0);
    }

    #[test]
    fn test_directory_source_reports_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::open(temp_dir.path(), None);
        let err = store
            .collection::<Vec<Exercise>>(Collection::Exercises)
            .unwrap_err();
        assert!(err.to_string().contains("exercise.json"));
    }
}
