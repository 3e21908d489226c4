//! Server half of state synchronization.
//!
//! [`StateSync`] remembers the last snapshot it broadcast. Each flush diffs
//! the live world against it and emits one [`StatePatch`] to everyone who is
//! already in sync. Connections that just joined or asked for a resync get a
//! full copy instead.

use crate::room::{Outbound, Target};
use log::debug;
use shared::{diff, Packet, StatePatch, WorldState};
use std::collections::HashSet;

pub struct StateSync {
    last: WorldState,
    revision: u32,
    needs_full_state: HashSet<String>,
}

impl StateSync {
    pub fn new(world: &WorldState) -> Self {
        Self {
            last: world.clone(),
            revision: 0,
            needs_full_state: HashSet::new(),
        }
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// Schedules a full state for this connection on the next flush.
    pub fn request_full_state(&mut self, session_id: &str) {
        self.needs_full_state.insert(session_id.to_string());
    }

    pub fn forget(&mut self, session_id: &str) {
        self.needs_full_state.remove(session_id);
    }

    /// Brings every recipient up to date with `world`.
    ///
    /// The revision only advances when something changed. When nobody needs
    /// a full state the patch goes out as a single room-wide packet.
    pub fn flush(&mut self, world: &WorldState, recipients: &[String]) -> Vec<Outbound> {
        let mut outbound = Vec::new();

        let changes = diff(&self.last, world);
        let patch = if changes.is_empty() {
            None
        } else {
            let base_revision = self.revision;
            self.revision = self.revision.wrapping_add(1);
            self.last = world.clone();
            debug!(
                "Revision {} -> {} ({} changes)",
                base_revision,
                self.revision,
                changes.len()
            );
            Some(StatePatch {
                base_revision,
                revision: self.revision,
                changes,
            })
        };

        let (full, in_sync): (Vec<&String>, Vec<&String>) = recipients
            .iter()
            .partition(|id| self.needs_full_state.contains(id.as_str()));

        for session_id in &full {
            outbound.push(Outbound {
                target: Target::Session((*session_id).clone()),
                packet: Packet::FullState {
                    revision: self.revision,
                    state: self.last.clone(),
                },
            });
        }
        // Requests from connections that are gone are dropped here too
        self.needs_full_state.clear();

        if let Some(patch) = patch {
            if full.is_empty() {
                outbound.push(Outbound {
                    target: Target::All,
                    packet: Packet::Patch(patch),
                });
            } else {
                for session_id in in_sync {
                    outbound.push(Outbound {
                        target: Target::Session(session_id.clone()),
                        packet: Packet::Patch(patch.clone()),
                    });
                }
            }
        }

        outbound
    }
}
