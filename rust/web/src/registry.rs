//! Process-wide connection and room bookkeeping.
//!
//! Both registries are plain maps behind an `RwLock`. Every operation takes
//! the lock once and never awaits while holding it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use thiserror::Error;

pub type ConnectionId = String;
pub type RoomId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => f.write_str("white"),
            Color::Black => f.write_str("black"),
        }
    }
}

/// What the server knows about one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRecord {
    pub room_id: RoomId,
    pub color: Color,
    pub multiplayer: bool,
}

/// Seats of one room. `occupancy` always equals the number of filled seats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomRecord {
    pub white: Option<ConnectionId>,
    pub black: Option<ConnectionId>,
    pub occupancy: u8,
}

impl RoomRecord {
    pub const CAPACITY: u8 = 2;

    pub fn seat(&self, color: Color) -> Option<&ConnectionId> {
        match color {
            Color::White => self.white.as_ref(),
            Color::Black => self.black.as_ref(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.occupancy >= Self::CAPACITY
    }

    /// Fills an empty seat. An occupied seat is left alone.
    fn fill(&mut self, color: Color, conn_id: &str) -> bool {
        let slot = match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        };
        if slot.is_some() || self.occupancy >= Self::CAPACITY {
            return false;
        }
        *slot = Some(conn_id.to_string());
        self.occupancy += 1;
        true
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Registry storage poisoned")]
    StoragePoisoned,
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),
    #[error("Room is full: {0}")]
    RoomFull(RoomId),
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    records: RwLock<HashMap<ConnectionId, ConnectionRecord>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the record unless the connection already has one. Returns
    /// whether the record was inserted.
    pub fn register(
        &self,
        conn_id: &str,
        room_id: &str,
        color: Color,
        multiplayer: bool,
    ) -> Result<bool, RegistryError> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        if guard.contains_key(conn_id) {
            return Ok(false);
        }
        guard.insert(
            conn_id.to_string(),
            ConnectionRecord {
                room_id: room_id.to_string(),
                color,
                multiplayer,
            },
        );
        Ok(true)
    }

    pub fn get(&self, conn_id: &str) -> Result<Option<ConnectionRecord>, RegistryError> {
        let guard = self
            .records
            .read()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        Ok(guard.get(conn_id).cloned())
    }

    /// Returns `false` when the connection has no record.
    pub fn set_multiplayer(&self, conn_id: &str, multiplayer: bool) -> Result<bool, RegistryError> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        match guard.get_mut(conn_id) {
            Some(record) => {
                record.multiplayer = multiplayer;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn remove(&self, conn_id: &str) -> Result<Option<ConnectionRecord>, RegistryError> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        Ok(guard.remove(conn_id))
    }

    pub fn len(&self) -> Result<usize, RegistryError> {
        let guard = self
            .records
            .read()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        Ok(guard.len())
    }

    pub fn is_empty(&self) -> Result<bool, RegistryError> {
        self.len().map(|len| len == 0)
    }
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, RoomRecord>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the room if needed and fills `color` if that seat is empty.
    /// Returns the room as it is afterwards.
    pub fn assign_seat(
        &self,
        room_id: &str,
        conn_id: &str,
        color: Color,
    ) -> Result<RoomRecord, RegistryError> {
        let mut guard = self
            .rooms
            .write()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        let room = guard.entry(room_id.to_string()).or_default();
        room.fill(color, conn_id);
        Ok(room.clone())
    }

    /// Seats a guest as Black in an existing, non-full room. Lookup and
    /// assignment happen under one lock so two guests cannot both succeed.
    /// Nothing changes when the room is missing or full.
    pub fn claim_guest_seat(
        &self,
        room_id: &str,
        conn_id: &str,
    ) -> Result<RoomRecord, RegistryError> {
        let mut guard = self
            .rooms
            .write()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        let room = guard
            .get_mut(room_id)
            .ok_or_else(|| RegistryError::RoomNotFound(room_id.to_string()))?;

        if room.is_full() || !room.fill(Color::Black, conn_id) {
            return Err(RegistryError::RoomFull(room_id.to_string()));
        }
        Ok(room.clone())
    }

    pub fn get(&self, room_id: &str) -> Result<Option<RoomRecord>, RegistryError> {
        let guard = self
            .rooms
            .read()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        Ok(guard.get(room_id).cloned())
    }

    pub fn delete_room(&self, room_id: &str) -> Result<Option<RoomRecord>, RegistryError> {
        let mut guard = self
            .rooms
            .write()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        Ok(guard.remove(room_id))
    }

    pub fn len(&self) -> Result<usize, RegistryError> {
        let guard = self
            .rooms
            .read()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        Ok(guard.len())
    }

    pub fn is_empty(&self) -> Result<bool, RegistryError> {
        self.len().map(|len| len == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn register_is_first_writer_wins() {
        let registry = ConnectionRegistry::new();
        assert!(registry.register("c1", "r1", Color::White, false).unwrap());
        assert!(!registry.register("c1", "r2", Color::Black, true).unwrap());

        let record = registry.get("c1").unwrap().expect("record");
        assert_eq!(record.room_id, "r1");
        assert_eq!(record.color, Color::White);
        assert!(!record.multiplayer);
    }

    #[test]
    fn set_multiplayer_only_touches_known_connections() {
        let registry = ConnectionRegistry::new();
        registry.register("c1", "r1", Color::White, false).unwrap();

        assert!(registry.set_multiplayer("c1", true).unwrap());
        assert!(!registry.set_multiplayer("ghost", true).unwrap());
        assert!(registry.get("c1").unwrap().unwrap().multiplayer);
    }

    #[test]
    fn remove_deletes_the_record() {
        let registry = ConnectionRegistry::new();
        registry.register("c1", "r1", Color::White, false).unwrap();
        assert!(registry.remove("c1").unwrap().is_some());
        assert!(registry.get("c1").unwrap().is_none());
        assert!(registry.is_empty().unwrap());
    }

    #[test]
    fn assign_seat_creates_room_and_counts_occupants() {
        let rooms = RoomRegistry::new();
        let room = rooms.assign_seat("r1", "c1", Color::White).unwrap();
        assert_eq!(room.occupancy, 1);
        assert_eq!(room.seat(Color::White).map(String::as_str), Some("c1"));

        let room = rooms.assign_seat("r1", "c2", Color::Black).unwrap();
        assert_eq!(room.occupancy, 2);
        assert!(room.is_full());
    }

    #[test]
    fn assign_seat_keeps_an_occupied_seat() {
        let rooms = RoomRegistry::new();
        rooms.assign_seat("r1", "c1", Color::White).unwrap();
        let room = rooms.assign_seat("r1", "c2", Color::White).unwrap();

        assert_eq!(room.white.as_deref(), Some("c1"));
        assert_eq!(room.occupancy, 1);
    }

    #[test]
    fn guest_cannot_join_missing_or_full_room() {
        let rooms = RoomRegistry::new();
        assert_eq!(
            rooms.claim_guest_seat("nowhere", "c1"),
            Err(RegistryError::RoomNotFound("nowhere".into()))
        );
        assert!(rooms.get("nowhere").unwrap().is_none());

        rooms.assign_seat("r1", "host", Color::White).unwrap();
        rooms.claim_guest_seat("r1", "guest").expect("seat free");
        let before = rooms.get("r1").unwrap();

        assert_eq!(
            rooms.claim_guest_seat("r1", "late"),
            Err(RegistryError::RoomFull("r1".into()))
        );
        assert_eq!(rooms.get("r1").unwrap(), before);
    }

    #[test]
    fn concurrent_guests_get_one_seat() {
        let rooms = Arc::new(RoomRegistry::new());
        rooms.assign_seat("r1", "host", Color::White).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let rooms = Arc::clone(&rooms);
                thread::spawn(move || rooms.claim_guest_seat("r1", &format!("guest-{i}")).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("join"))
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(rooms.get("r1").unwrap().unwrap().occupancy, 2);
    }

    #[test]
    fn color_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Color::White).unwrap(), "\"white\"");
        assert_eq!(Color::Black.opposite(), Color::White);
    }
}
