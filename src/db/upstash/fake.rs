//! In-process stand-in for the Upstash transport: a small Redis subset plus
//! a log of every round trip and scripted failures.

use super::client::KvClient;
use crate::core::error::{LunaError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Entry {
    Str(String),
    Set(BTreeSet<String>),
    List(VecDeque<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Command(Vec<String>),
    Pipeline(Vec<Vec<String>>),
}

#[derive(Default)]
pub struct FakeKv {
    data: Mutex<HashMap<String, Entry>>,
    calls: Mutex<Vec<Call>>,
    transient_failures: Mutex<u32>,
    permanent_failures: Mutex<u32>,
}

impl FakeKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` round trips with a connection error
    pub fn fail_transient(&self, n: u32) {
        *self.transient_failures.lock().unwrap() = n;
    }

    /// Fail the next `n` round trips with a non-retryable error
    pub fn fail_permanent(&self, n: u32) {
        *self.permanent_failures.lock().unwrap() = n;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Commands sent alone (not in a pipeline) whose name is `name`
    pub fn commands_named(&self, name: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Command(cmd) if cmd[0] == name => Some(cmd),
                _ => None,
            })
            .collect()
    }

    pub fn set_raw(&self, key: &str, value: &str) {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), Entry::Str(value.to_string()));
    }

    pub fn remove_raw(&self, key: &str) {
        self.data.lock().unwrap().remove(key);
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        match self.data.lock().unwrap().get(key) {
            Some(Entry::Str(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn set_members(&self, key: &str) -> Vec<String> {
        match self.data.lock().unwrap().get(key) {
            Some(Entry::Set(set)) => set.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.lock().unwrap().contains_key(key)
    }

    fn take_failure(&self) -> Option<LunaError> {
        let mut transient = self.transient_failures.lock().unwrap();
        if *transient > 0 {
            *transient -= 1;
            return Some(LunaError::NetworkError("Connection reset (ECONNRESET)".into()));
        }
        let mut permanent = self.permanent_failures.lock().unwrap();
        if *permanent > 0 {
            *permanent -= 1;
            return Some(LunaError::StorageError("WRONGPASS invalid token".into()));
        }
        None
    }

    fn apply(&self, command: &[String]) -> Result<Value> {
        let mut data = self.data.lock().unwrap();
        let name = command[0].to_uppercase();
        let args = &command[1..];

        let reply = match name.as_str() {
            "GET" => match data.get(&args[0]) {
                Some(Entry::Str(s)) => json!(s),
                Some(_) => return Err(wrong_type()),
                None => Value::Null,
            },
            "SET" => {
                data.insert(args[0].clone(), Entry::Str(args[1].clone()));
                json!("OK")
            }
            "DEL" => json!(args.iter().filter(|k| data.remove(*k).is_some()).count()),
            "EXISTS" => json!(args.iter().filter(|k| data.contains_key(*k)).count()),
            "MGET" => Value::Array(
                args.iter()
                    .map(|k| match data.get(k) {
                        Some(Entry::Str(s)) => json!(s),
                        _ => Value::Null,
                    })
                    .collect(),
            ),
            "KEYS" => {
                let mut keys: Vec<&String> =
                    data.keys().filter(|k| glob_match(&args[0], k)).collect();
                keys.sort();
                json!(keys)
            }
            "SADD" => {
                let entry = data
                    .entry(args[0].clone())
                    .or_insert_with(|| Entry::Set(BTreeSet::new()));
                let Entry::Set(set) = entry else {
                    return Err(wrong_type());
                };
                json!(args[1..].iter().filter(|m| set.insert((*m).clone())).count())
            }
            "SREM" => match data.get_mut(&args[0]) {
                Some(Entry::Set(set)) => {
                    let removed = args[1..].iter().filter(|m| set.remove(*m)).count();
                    if set.is_empty() {
                        data.remove(&args[0]);
                    }
                    json!(removed)
                }
                Some(_) => return Err(wrong_type()),
                None => json!(0),
            },
            "SMEMBERS" => match data.get(&args[0]) {
                Some(Entry::Set(set)) => json!(set.iter().collect::<Vec<_>>()),
                Some(_) => return Err(wrong_type()),
                None => json!([]),
            },
            "LPUSH" => {
                let entry = data
                    .entry(args[0].clone())
                    .or_insert_with(|| Entry::List(VecDeque::new()));
                let Entry::List(list) = entry else {
                    return Err(wrong_type());
                };
                for value in &args[1..] {
                    list.push_front(value.clone());
                }
                json!(list.len())
            }
            "LREM" => match data.get_mut(&args[0]) {
                Some(Entry::List(list)) => {
                    let before = list.len();
                    list.retain(|v| v != &args[2]);
                    json!(before - list.len())
                }
                Some(_) => return Err(wrong_type()),
                None => json!(0),
            },
            "LTRIM" => {
                if let Some(Entry::List(list)) = data.get_mut(&args[0]) {
                    let (start, stop) = range(list.len(), &args[1], &args[2]);
                    let kept: VecDeque<String> = list
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i >= start && *i <= stop)
                        .map(|(_, v)| v.clone())
                        .collect();
                    *list = kept;
                }
                json!("OK")
            }
            "LRANGE" => match data.get(&args[0]) {
                Some(Entry::List(list)) => {
                    let (start, stop) = range(list.len(), &args[1], &args[2]);
                    json!(list
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i >= start && *i <= stop)
                        .map(|(_, v)| v)
                        .collect::<Vec<_>>())
                }
                Some(_) => return Err(wrong_type()),
                None => json!([]),
            },
            other => {
                return Err(LunaError::StorageError(format!("ERR unknown command '{}'", other)))
            }
        };

        Ok(reply)
    }
}

fn wrong_type() -> LunaError {
    LunaError::StorageError("WRONGTYPE Operation against a key holding the wrong kind of value".into())
}

/// Resolve Redis list indices (negative counts from the end) to an inclusive range
fn range(len: usize, start: &str, stop: &str) -> (usize, usize) {
    let resolve = |raw: &str| -> i64 {
        let n: i64 = raw.parse().unwrap_or(0);
        if n < 0 {
            len as i64 + n
        } else {
            n
        }
    };
    let start = resolve(start).max(0) as usize;
    let stop = resolve(stop);
    if stop < 0 {
        return (1, 0);
    }
    (start, stop as usize)
}

/// Redis glob matching: `*`, `?`, `[...]` classes and backslash escapes
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    glob_match_at(&pattern, &text)
}

fn glob_match_at(pattern: &[char], text: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('*') => (0..=text.len()).any(|skip| glob_match_at(&pattern[1..], &text[skip..])),
        Some('?') => !text.is_empty() && glob_match_at(&pattern[1..], &text[1..]),
        Some('[') => {
            let Some(close) = pattern.iter().skip(1).position(|c| *c == ']').map(|p| p + 1) else {
                return text.first() == Some(&'[') && glob_match_at(&pattern[1..], &text[1..]);
            };
            let class = &pattern[1..close];
            match text.first() {
                Some(c) if class.contains(c) => glob_match_at(&pattern[close + 1..], &text[1..]),
                _ => false,
            }
        }
        Some('\\') if pattern.len() > 1 => {
            text.first() == Some(&pattern[1]) && glob_match_at(&pattern[2..], &text[1..])
        }
        Some(c) => text.first() == Some(c) && glob_match_at(&pattern[1..], &text[1..]),
    }
}

#[async_trait]
impl KvClient for FakeKv {
    async fn command(&self, command: Vec<String>) -> Result<Value> {
        self.calls.lock().unwrap().push(Call::Command(command.clone()));
        if let Some(e) = self.take_failure() {
            return Err(e);
        }
        self.apply(&command)
    }

    async fn pipeline(&self, commands: Vec<Vec<String>>) -> Result<Vec<Value>> {
        self.calls.lock().unwrap().push(Call::Pipeline(commands.clone()));
        if let Some(e) = self.take_failure() {
            return Err(e);
        }
        commands.iter().map(|c| self.apply(c)).collect()
    }
}

#[test]
fn test_glob_match() {
    assert!(glob_match("u:*:pwd", "u:alice:pwd"));
    assert!(!glob_match("u:*:pwd", "u:alice:pr:x+1"));
    assert!(glob_match("u:alice:*", "u:alice:sh"));
    assert!(!glob_match("u:alice:*", "u:alicia:sh"));
    assert!(glob_match("admin:config", "admin:config"));
}

#[test]
fn test_list_ranges() {
    assert_eq!(range(5, "0", "-1"), (0, 4));
    assert_eq!(range(30, "0", "19"), (0, 19));
}
