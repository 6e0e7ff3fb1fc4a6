//! The `OccupancyView` implementation backing real-time handlers' zone and
//! sub-zone broadcast fan-out, built on top of `mythos-world`'s
//! `RoomCatalog`.

use async_trait::async_trait;
use mythos_connections::OccupancyView;
use mythos_common::{PlayerId, RoomId, SubZoneId, ZoneId};
use mythos_world::RoomCatalog;
use std::sync::Arc;

pub struct RoomCatalogOccupancyView {
    catalog: Arc<RoomCatalog>,
}

impl RoomCatalogOccupancyView {
    pub fn new(catalog: Arc<RoomCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl OccupancyView for RoomCatalogOccupancyView {
    async fn players_in_room(&self, room_id: &RoomId) -> Vec<PlayerId> {
        self.catalog.get(room_id).map(|room| room.occupants()).unwrap_or_default()
    }

    async fn players_in_zone(&self, zone_id: &ZoneId) -> Vec<PlayerId> {
        self.catalog
            .all_rooms()
            .iter()
            .filter(|room| &room.zone == zone_id)
            .flat_map(|room| room.occupants())
            .collect()
    }

    async fn players_in_sub_zone(&self, sub_zone_id: &SubZoneId) -> Vec<PlayerId> {
        self.catalog
            .all_rooms()
            .iter()
            .filter(|room| room.sub_zone.as_ref() == Some(sub_zone_id))
            .flat_map(|room| room.occupants())
            .collect()
    }
}
