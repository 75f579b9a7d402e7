use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const USAGE_KEY: &str = "fileUsageCounts";
pub const GROUPS_KEY: &str = "savedGroups";
pub const TOP_USED_LIMIT: usize = 10;

/// Durable string storage, one value per key.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> io::Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        (**self).set(key, value)
    }
}

/// Keeps every key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    /// `<config dir>/repopick`, if the platform has a config dir.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|base| base.join("repopick"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.key_path(key)).ok()
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.key_path(key);
        let tmp = path.with_extension("tmp");
        if let Err(e) = fs::write(&tmp, value).and_then(|_| fs::rename(&tmp, &path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Path -> copy count, kept in the order each path was first counted.
/// Serialized as a plain JSON object in that same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageCounters {
    entries: Vec<(String, u64)>,
}

impl UsageCounters {
    pub fn get(&self, path: &str) -> u64 {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map_or(0, |(_, count)| *count)
    }

    pub fn bump(&mut self, path: &str) {
        match self.entries.iter_mut().find(|(p, _)| p == path) {
            Some((_, count)) => *count = count.saturating_add(1),
            None => self.entries.push((path.to_string(), 1)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest counts first; equal counts keep first-observed order.
    pub fn top(&self, n: usize) -> Vec<(String, u64)> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|(_, a), (_, b)| b.cmp(a));
        ranked.truncate(n);
        ranked
    }
}

impl Serialize for UsageCounters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (path, count) in &self.entries {
            map.serialize_entry(path, count)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for UsageCounters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CountersVisitor;

        impl<'de> Visitor<'de> for CountersVisitor {
            type Value = UsageCounters;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of file paths to usage counts")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut counters = UsageCounters::default();
                while let Some((path, count)) = access.next_entry::<String, u64>()? {
                    match counters.entries.iter_mut().find(|(p, _)| *p == path) {
                        Some(entry) => entry.1 = count,
                        None => counters.entries.push((path, count)),
                    }
                }
                Ok(counters)
            }
        }

        deserializer.deserialize_map(CountersVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedGroup {
    pub name: String,
    pub paths: Vec<String>,
}

/// Usage counters and saved groups, loaded once and written back after
/// every change. Assumes it is the only writer.
pub struct PersistenceStore<S: KeyValueStore> {
    kv: S,
    usage: UsageCounters,
    groups: Vec<SavedGroup>,
}

impl<S: KeyValueStore> PersistenceStore<S> {
    /// Missing or unreadable namespaces start out empty.
    pub fn load(kv: S) -> Self {
        let usage = read_namespace(&kv, USAGE_KEY);
        let groups = read_namespace(&kv, GROUPS_KEY);
        PersistenceStore { kv, usage, groups }
    }

    pub fn reload(&mut self) {
        self.usage = read_namespace(&self.kv, USAGE_KEY);
        self.groups = read_namespace(&self.kv, GROUPS_KEY);
    }

    pub fn backing(&self) -> &S {
        &self.kv
    }

    pub fn count(&self, path: &str) -> u64 {
        self.usage.get(path)
    }

    pub fn usage(&self) -> &UsageCounters {
        &self.usage
    }

    pub fn bump_usage<P: AsRef<str>>(&mut self, paths: &[P]) -> io::Result<()> {
        let mut next = self.usage.clone();
        for path in paths {
            next.bump(path.as_ref());
        }
        write_namespace(&mut self.kv, USAGE_KEY, &next)?;
        self.usage = next;
        Ok(())
    }

    pub fn top_used(&self, n: usize) -> Vec<String> {
        self.usage.top(n).into_iter().map(|(path, _)| path).collect()
    }

    pub fn groups(&self) -> &[SavedGroup] {
        &self.groups
    }

    /// Returns `Ok(false)` when the name or the path list is empty.
    pub fn save_group(&mut self, name: &str, paths: &[String]) -> io::Result<bool> {
        let name = name.trim();
        if name.is_empty() || paths.is_empty() {
            return Ok(false);
        }
        let mut next = self.groups.clone();
        next.push(SavedGroup {
            name: name.to_string(),
            paths: paths.to_vec(),
        });
        write_namespace(&mut self.kv, GROUPS_KEY, &next)?;
        self.groups = next;
        Ok(true)
    }

    /// Returns `Ok(false)` for an index past the end.
    pub fn delete_group(&mut self, index: usize) -> io::Result<bool> {
        if index >= self.groups.len() {
            return Ok(false);
        }
        let mut next = self.groups.clone();
        next.remove(index);
        write_namespace(&mut self.kv, GROUPS_KEY, &next)?;
        self.groups = next;
        Ok(true)
    }

    pub fn find_group(&self, name: &str) -> Option<&SavedGroup> {
        self.groups.iter().find(|g| g.name == name)
    }
}

fn read_namespace<S, T>(kv: &S, key: &str) -> T
where
    S: KeyValueStore,
    T: for<'de> Deserialize<'de> + Default,
{
    kv.get(key)
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

fn write_namespace<S: KeyValueStore, T: Serialize>(
    kv: &mut S,
    key: &str,
    value: &T,
) -> io::Result<()> {
    let raw = serde_json::to_string(value).map_err(io::Error::other)?;
    kv.set(key, &raw)
}
