//! Room membership state.
//!
//! One registry instance is owned by the server loop; every mutation goes
//! through that single task, so membership changes never interleave.

use std::collections::HashMap;

use playsync_proto::ParticipantIdentity;

use crate::net::inbound::ConnId;
use crate::net::outbound::OutboundTx;

/// One connected peer inside a room.
#[derive(Debug, Clone)]
pub struct Member {
    pub client_id: String,
    pub nickname: String,
    pub outbound: OutboundTx,
}

impl Member {
    pub fn identity(&self) -> ParticipantIdentity {
        ParticipantIdentity {
            client_id: self.client_id.clone(),
            nickname: self.nickname.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Room {
    members: HashMap<ConnId, Member>,
}

impl Room {
    fn roster(&self) -> Vec<ParticipantIdentity> {
        self.members.values().map(Member::identity).collect()
    }
}

/// What a connection left behind when it was removed from a room.
#[derive(Debug)]
pub struct Departure {
    pub room_id: String,
    pub member: Member,
    /// Members still in the room after the departure.
    pub remaining: Vec<OutboundTx>,
    /// Roster snapshot after the departure.
    pub roster: Vec<ParticipantIdentity>,
}

/// Room table. A connection belongs to at most one room at a time.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    conn_rooms: HashMap<ConnId, String>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Room the connection currently belongs to, if any.
    pub fn room_of(&self, conn_id: ConnId) -> Option<&str> {
        self.conn_rooms.get(&conn_id).map(String::as_str)
    }

    pub fn contains_room(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Membership snapshot; order is irrelevant.
    pub fn roster(&self, room_id: &str) -> Vec<ParticipantIdentity> {
        self.rooms.get(room_id).map(Room::roster).unwrap_or_default()
    }

    /// Outbound queues of every room member except `exclude`.
    pub fn broadcast_targets(&self, room_id: &str, exclude: ConnId) -> Vec<OutboundTx> {
        let Some(room) = self.rooms.get(room_id) else {
            return Vec::new();
        };
        room.members
            .iter()
            .filter(|(id, _)| **id != exclude)
            .map(|(_, m)| m.outbound.clone())
            .collect()
    }

    /// Register a connection under a room, atomically leaving any prior one.
    ///
    /// Returns the departure from the old room (if there was one and it
    /// still has members to notify) and the post-join roster.
    pub fn join(
        &mut self,
        conn_id: ConnId,
        room_id: &str,
        member: Member,
    ) -> (Option<Departure>, Vec<ParticipantIdentity>) {
        let departure = self.leave(conn_id);
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .members
            .insert(conn_id, member);
        self.conn_rooms.insert(conn_id, room_id.to_string());
        (departure, self.roster(room_id))
    }

    /// Remove a connection from its room. Idempotent.
    ///
    /// An emptied room is discarded.
    pub fn leave(&mut self, conn_id: ConnId) -> Option<Departure> {
        let room_id = self.conn_rooms.remove(&conn_id)?;
        let room = self.rooms.get_mut(&room_id)?;
        let member = room.members.remove(&conn_id)?;

        if room.members.is_empty() {
            self.rooms.remove(&room_id);
            return Some(Departure {
                room_id,
                member,
                remaining: Vec::new(),
                roster: Vec::new(),
            });
        }

        let remaining = room.members.values().map(|m| m.outbound.clone()).collect();
        let roster = room.roster();
        Some(Departure {
            room_id,
            member,
            remaining,
            roster,
        })
    }
}
