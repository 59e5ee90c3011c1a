//! Content fingerprints of decoded candidate models.
//!
//! The model is serialised to a tagged, length-prefixed byte stream in
//! declaration order and hashed with BLAKE3. Everything evaluation reads
//! goes in, so equal fingerprints mean equal verdicts and objectives.

use std::fmt;

use crate::model::{Direction, Metric, PropertyKind, Scheduler, TimingModel};

const FINGERPRINT_VERSION: u8 = 1;

const TAG_COMPONENT: u8 = 0x01;
const TAG_CONNECTION: u8 = 0x02;
const TAG_BOUNDED: u8 = 0x03;
const TAG_CHAIN: u8 = 0x04;
const TAG_CPU: u8 = 0x05;
const TAG_OBJECTIVE: u8 = 0x06;
const TAG_CONSTRAINT: u8 = 0x07;
const TAG_NONE: u8 = 0x00;
const TAG_SOME: u8 = 0xFF;

/// A 256-bit BLAKE3 digest of a model's canonical encoding.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub fn of(model: &TimingModel) -> Self {
        Fingerprint(*blake3::hash(&canonical_bytes(model)).as_bytes())
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// First 40 bits in base-32, 8 characters.
    pub fn to_short(&self) -> String {
        const ALPHABET: &[u8] = b"0123456789abcdefghjkmnpqrstvwxyz";
        let bits = u64::from_be_bytes([0, 0, 0, self.0[0], self.0[1], self.0[2], self.0[3], self.0[4]]);
        (0..8)
            .rev()
            .map(|i| ALPHABET[((bits >> (i * 5)) & 0x1F) as usize] as char)
            .collect()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_short())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_short())
    }
}

/// Canonical encoding of `model`.
pub fn canonical_bytes(model: &TimingModel) -> Vec<u8> {
    let mut enc = Encoder::default();
    enc.byte(FINGERPRINT_VERSION);

    for c in model.components() {
        enc.byte(TAG_COMPONENT);
        enc.str(&c.id);
        enc.opt(c.period.map(|p| p.0));
        enc.opt(c.deadline.map(|d| d.0));
        enc.u64(c.wcet.0);
        enc.u64(c.priority as u64);
        enc.opt(c.core.map(u64::from));
    }
    for conn in model.connections() {
        enc.byte(TAG_CONNECTION);
        enc.str(&conn.id);
        enc.u64(conn.source.component as u64);
        enc.str(&conn.source.port);
        enc.u64(conn.target.component as u64);
        enc.str(&conn.target.port);
        enc.opt(conn.latency_budget.map(|b| b.0));
    }
    for prop in model.properties() {
        match &prop.kind {
            PropertyKind::BoundedResponse { stimulus, response, bound } => {
                enc.byte(TAG_BOUNDED);
                enc.str(&prop.id);
                enc.u64(*stimulus as u64);
                enc.u64(*response as u64);
                enc.u64(bound.0);
            }
            PropertyKind::LatencyString { chain, bound, .. } => {
                enc.byte(TAG_CHAIN);
                enc.str(&prop.id);
                enc.u64(chain.len() as u64);
                for &c in chain {
                    enc.u64(c as u64);
                }
                enc.u64(bound.0);
            }
        }
    }

    let cpu = model.cpu();
    enc.byte(TAG_CPU);
    enc.u64(u64::from(cpu.cores));
    enc.byte(match cpu.scheduler {
        Scheduler::PreemptiveFp => 0,
        Scheduler::NonPreemptiveFp => 1,
    });

    for obj in &model.optimisation().objectives {
        enc.byte(TAG_OBJECTIVE);
        enc.byte(match obj.direction {
            Direction::Minimize => 0,
            Direction::Maximize => 1,
        });
        match &obj.metric {
            Metric::Attribute(attr) => enc.str(&attr.display(model).to_string()),
            _ => enc.str(&obj.name),
        }
    }
    for c in &model.optimisation().constraints {
        enc.byte(TAG_CONSTRAINT);
        enc.str(&c.text);
    }
    enc.buf
}

#[derive(Default)]
struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    fn byte(&mut self, b: u8) {
        self.buf.push(b);
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn str(&mut self, s: &str) {
        self.u64(s.len() as u64);
        self.buf.extend_from_slice(s.as_bytes());
    }

    fn opt(&mut self, v: Option<u64>) {
        match v {
            Some(v) => {
                self.byte(TAG_SOME);
                self.u64(v);
            }
            None => self.byte(TAG_NONE),
        }
    }
}
