use chrono::NaiveDate;
use dashmap::DashMap;
use serde::{Serialize, Serializer};
use std::net::IpAddr;

// Usage class - decides which ledger a request is charged against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaClass {
    Free,
    Premium,
}

impl QuotaClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaClass::Free => "free",
            QuotaClass::Premium => "premium",
        }
    }
}

// Ledger key. Free is lifetime scoped (ip only), premium is scoped to a calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QuotaKey {
    Free(IpAddr),
    Premium { token: String, day: NaiveDate },
}

impl QuotaKey {
    pub fn class(&self) -> QuotaClass {
        match self {
            QuotaKey::Free(_) => QuotaClass::Free,
            QuotaKey::Premium { .. } => QuotaClass::Premium,
        }
    }
}

// Fixed per-class limits, taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct QuotaLimits {
    pub free: u32,
    pub premium: u32,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            free: 3,
            premium: 100,
        }
    }
}

// Snapshot of one key's consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaRecord {
    pub used: u32,
    pub limit: u32,
    pub class: QuotaClass,
}

impl QuotaRecord {
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }

    pub fn exceeded(&self) -> bool {
        self.used >= self.limit
    }
}

// Wire form: {current, limit, remaining, exceeded, type}
#[derive(Serialize)]
struct UsageReport {
    current: u32,
    limit: u32,
    remaining: u32,
    exceeded: bool,
    #[serde(rename = "type")]
    class: QuotaClass,
}

impl Serialize for QuotaRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        UsageReport {
            current: self.used,
            limit: self.limit,
            remaining: self.remaining(),
            exceeded: self.exceeded(),
            class: self.class,
        }
        .serialize(serializer)
    }
}

// In-memory usage counters. Free and premium live in separate maps so one
// can never credit or clear the other.
pub struct QuotaLedger {
    free: DashMap<IpAddr, u32>,
    premium: DashMap<(String, NaiveDate), u32>,
    limits: QuotaLimits,
}

impl QuotaLedger {
    pub fn new(limits: QuotaLimits) -> Self {
        Self {
            free: DashMap::new(),
            premium: DashMap::new(),
            limits,
        }
    }

    pub fn limits(&self) -> QuotaLimits {
        self.limits
    }

    // Read-only; an unseen key reports zero usage
    pub fn check(&self, key: &QuotaKey) -> QuotaRecord {
        match key {
            QuotaKey::Free(ip) => QuotaRecord {
                used: self.free.get(ip).map(|used| *used).unwrap_or(0),
                limit: self.limits.free,
                class: QuotaClass::Free,
            },
            QuotaKey::Premium { token, day } => QuotaRecord {
                used: self
                    .premium
                    .get(&(token.clone(), *day))
                    .map(|used| *used)
                    .unwrap_or(0),
                limit: self.limits.premium,
                class: QuotaClass::Premium,
            },
        }
    }

    // Charge one unit. Every call is one unit of consumption, so callers must
    // only call this after the generation it pays for has succeeded.
    pub fn increment(&self, key: &QuotaKey) {
        // the entry guard holds the shard lock for the whole read-modify-write
        match key {
            QuotaKey::Free(ip) => {
                let mut used = self.free.entry(*ip).or_insert(0);
                *used = used.saturating_add(1);
            }
            QuotaKey::Premium { token, day } => {
                let mut used = self.premium.entry((token.clone(), *day)).or_insert(0);
                *used = used.saturating_add(1);
            }
        }
    }

    // Daily rollover. Free usage is lifetime scoped and is left alone.
    pub fn reset_premium(&self) -> usize {
        let cleared = self.premium.len();
        self.premium.clear();
        cleared
    }
}
