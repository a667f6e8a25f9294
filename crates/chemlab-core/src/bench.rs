//! Bench registry - the ECS world holding the flask, vessels and apparatus.
//!
//! Entities are looked up by [`BenchId`] through an ordered index so that
//! iteration (and therefore snapshots) is deterministic.

use std::collections::BTreeMap;

use chemlab_logic::reactions::RuleTable;
use hecs::{Entity, World};

use crate::components::*;
use crate::error::LabError;

/// The lab bench: one permanent flask plus whatever has been placed.
pub struct Bench {
    world: World,
    index: BTreeMap<BenchId, Entity>,
    next_id: u32,
    capacity: usize,
}

impl Bench {
    /// A bench holding only an empty flask.
    pub fn new(capacity: usize) -> Self {
        let mut bench = Self {
            world: World::new(),
            index: BTreeMap::new(),
            next_id: 1,
            capacity,
        };
        bench.spawn_flask(Container::flask());
        bench
    }

    fn spawn_flask(&mut self, container: Container) {
        let entity = self
            .world
            .spawn((BenchItem { id: BenchId::FLASK }, container));
        self.index.insert(BenchId::FLASK, entity);
    }

    fn allocate_id(&mut self) -> BenchId {
        let id = BenchId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Place a vessel and give it an empty container.
    pub fn create_container(&mut self, kind: &str, position: BenchPosition) -> BenchId {
        let id = self.allocate_id();
        let entity = self.world.spawn((
            BenchItem { id },
            Apparatus {
                kind: kind.to_string(),
            },
            position,
            Container::new(ContainerKind::Vessel(kind.to_string())),
        ));
        self.index.insert(id, entity);
        id
    }

    /// Place apparatus that cannot hold chemicals.
    pub fn place_apparatus(&mut self, kind: &str, position: BenchPosition) -> BenchId {
        let id = self.allocate_id();
        let entity = self.world.spawn((
            BenchItem { id },
            Apparatus {
                kind: kind.to_string(),
            },
            position,
        ));
        self.index.insert(id, entity);
        id
    }

    /// Remove a placed item. The flask and unknown ids are left alone and
    /// return `false`.
    pub fn destroy(&mut self, id: BenchId) -> bool {
        if id.is_flask() {
            return false;
        }
        match self.index.remove(&id) {
            Some(entity) => self.world.despawn(entity).is_ok(),
            None => false,
        }
    }

    /// Remove every placed item, keeping the flask (emptied).
    pub fn clear_placed(&mut self) {
        let flask = self.take_flask();
        self.world.clear();
        self.index.clear();
        self.spawn_flask(flask);
        if let Some(flask) = self.container_mut(BenchId::FLASK) {
            flask.clear();
            flask.is_reacting = false;
        }
    }

    fn take_flask(&self) -> Container {
        self.container(BenchId::FLASK)
            .map(|c| (*c).clone())
            .unwrap_or_else(Container::flask)
    }

    pub fn contains(&self, id: BenchId) -> bool {
        self.index.contains_key(&id)
    }

    /// Container on a bench item, if the item holds chemicals.
    pub fn container(&self, id: BenchId) -> Option<hecs::Ref<'_, Container>> {
        let entity = *self.index.get(&id)?;
        self.world.get::<&Container>(entity).ok()
    }

    pub fn container_mut(&mut self, id: BenchId) -> Option<&mut Container> {
        let entity = *self.index.get(&id)?;
        self.world.query_one_mut::<&mut Container>(entity).ok()
    }

    /// Container or `UnknownContainer`.
    pub fn require_container(&self, id: BenchId) -> Result<hecs::Ref<'_, Container>, LabError> {
        self.container(id).ok_or(LabError::UnknownContainer { id })
    }

    /// Apparatus kind of a placed item (`None` for the flask).
    pub fn apparatus_kind(&self, id: BenchId) -> Option<String> {
        let entity = *self.index.get(&id)?;
        self.world
            .get::<&Apparatus>(entity)
            .ok()
            .map(|a| a.kind.clone())
    }

    pub fn position(&self, id: BenchId) -> Option<BenchPosition> {
        let entity = *self.index.get(&id)?;
        self.world.get::<&BenchPosition>(entity).ok().map(|p| *p)
    }

    /// Move a placed item, snapping to the grid.
    pub fn move_item(&mut self, id: BenchId, x: f32, y: f32) -> bool {
        let Some(&entity) = self.index.get(&id) else {
            return false;
        };
        match self.world.query_one_mut::<&mut BenchPosition>(entity) {
            Ok(position) => {
                *position = BenchPosition::snapped(x, y);
                true
            }
            Err(_) => false,
        }
    }

    /// Number of placed items of one kind.
    pub fn count_kind(&self, kind: &str) -> usize {
        self.world
            .query::<&Apparatus>()
            .iter()
            .filter(|(_, a)| a.kind == kind)
            .count()
    }

    /// All bench ids in ascending order (flask first).
    pub fn ids(&self) -> Vec<BenchId> {
        self.index.keys().copied().collect()
    }

    /// Ids of every item that holds chemicals, ascending.
    pub fn container_ids(&self) -> Vec<BenchId> {
        self.index
            .iter()
            .filter(|(_, entity)| self.world.get::<&Container>(**entity).is_ok())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Ids of containers currently reacting.
    pub fn reacting_ids(&self) -> Vec<BenchId> {
        self.container_ids()
            .into_iter()
            .filter(|id| self.container(*id).map(|c| c.is_reacting).unwrap_or(false))
            .collect()
    }

    pub fn item_count(&self) -> usize {
        self.index.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Append a unit and re-match the contents against the rules.
    ///
    /// Fails with `UnknownContainer`, `ReactionInProgress` or
    /// `CapacityExceeded`; the pause check belongs to the lab.
    pub fn add_chemical(
        &mut self,
        id: BenchId,
        unit: ChemicalUnit,
        rules: &RuleTable,
    ) -> Result<(), LabError> {
        self.check_can_add(id)?;
        let container = self
            .container_mut(id)
            .ok_or(LabError::UnknownContainer { id })?;
        container.contents.push(unit);
        container.refresh_pending(rules);
        Ok(())
    }

    /// Validate an addition without applying it.
    pub fn check_can_add(&self, id: BenchId) -> Result<(), LabError> {
        let container = self.require_container(id)?;
        if container.is_reacting {
            return Err(LabError::ReactionInProgress { id });
        }
        if container.contents.len() >= self.capacity {
            return Err(LabError::CapacityExceeded {
                id,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Empty a container.
    pub fn clear(&mut self, id: BenchId) -> Result<(), LabError> {
        if self.require_container(id)?.is_reacting {
            return Err(LabError::ReactionInProgress { id });
        }
        if let Some(container) = self.container_mut(id) {
            container.clear();
        }
        Ok(())
    }

    /// Every item as plain data, in id order.
    pub fn items(&self) -> Vec<BenchItemData> {
        let mut items = Vec::with_capacity(self.index.len());
        for (&id, &entity) in &self.index {
            let Ok(entity_ref) = self.world.entity(entity) else {
                continue;
            };
            items.push(BenchItemData {
                id,
                apparatus: entity_ref.get::<&Apparatus>().map(|a| (*a).clone()),
                position: entity_ref.get::<&BenchPosition>().map(|p| *p),
                container: entity_ref.get::<&Container>().map(|c| (*c).clone()),
            });
        }
        items
    }

    /// Rebuild a bench from plain item data.
    pub fn from_items(items: Vec<BenchItemData>, next_id: u32, capacity: usize) -> Self {
        let mut bench = Self {
            world: World::new(),
            index: BTreeMap::new(),
            next_id: 1,
            capacity,
        };

        let mut saw_flask = false;
        for item in items {
            if item.id.is_flask() {
                if saw_flask {
                    continue;
                }
                saw_flask = true;
                bench.spawn_flask(item.container.unwrap_or_else(Container::flask));
                continue;
            }
            if bench.index.contains_key(&item.id) {
                continue;
            }
            let entity = bench.world.spawn((BenchItem { id: item.id },));
            if let Some(apparatus) = item.apparatus {
                let _ = bench.world.insert_one(entity, apparatus);
            }
            if let Some(position) = item.position {
                let _ = bench.world.insert_one(entity, position);
            }
            if let Some(container) = item.container {
                let _ = bench.world.insert_one(entity, container);
            }
            bench.index.insert(item.id, entity);
            bench.next_id = bench.next_id.max(item.id.0 + 1);
        }

        if !saw_flask {
            bench.spawn_flask(Container::flask());
        }
        bench.next_id = bench.next_id.max(next_id);
        bench
    }
}

/// Plain-data view of one bench item.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BenchItemData {
    pub id: BenchId,
    pub apparatus: Option<Apparatus>,
    pub position: Option<BenchPosition>,
    pub container: Option<Container>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chemlab_logic::catalog::ChemicalType;

    fn unit(formula: &str) -> ChemicalUnit {
        ChemicalUnit::new(formula, formula, "#fff", ChemicalType::Unknown, 10.0)
    }

    #[test]
    fn test_new_bench_has_empty_flask() {
        let bench = Bench::new(3);
        assert_eq!(bench.ids(), vec![BenchId::FLASK]);
        let flask = bench.container(BenchId::FLASK).unwrap();
        assert_eq!(flask.kind, ContainerKind::Flask);
        assert!(flask.contents.is_empty());
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut bench = Bench::new(3);
        let a = bench.create_container("beaker", BenchPosition::default());
        let b = bench.place_apparatus("stirrer", BenchPosition::default());
        assert!(bench.destroy(a));
        let c = bench.create_container("test_tube", BenchPosition::default());
        assert_eq!((a, b, c), (BenchId(1), BenchId(2), BenchId(3)));
        assert_eq!(bench.container_ids(), vec![BenchId::FLASK, c]);
    }

    #[test]
    fn test_destroy_is_silent_for_missing_and_flask() {
        let mut bench = Bench::new(3);
        assert!(!bench.destroy(BenchId(42)));
        assert!(!bench.destroy(BenchId::FLASK));
        assert!(bench.contains(BenchId::FLASK));
    }

    #[test]
    fn test_add_chemical_capacity() {
        let mut bench = Bench::new(3);
        let rules = RuleTable::new();
        for f in ["A", "B", "C"] {
            bench.add_chemical(BenchId::FLASK, unit(f), &rules).unwrap();
        }
        let err = bench.add_chemical(BenchId::FLASK, unit("D"), &rules).unwrap_err();
        assert_eq!(
            err,
            LabError::CapacityExceeded {
                id: BenchId::FLASK,
                capacity: 3
            }
        );
        assert_eq!(bench.container(BenchId::FLASK).unwrap().contents.len(), 3);
    }

    #[test]
    fn test_add_chemical_rejects_reacting() {
        let mut bench = Bench::new(3);
        bench.container_mut(BenchId::FLASK).unwrap().is_reacting = true;
        let err = bench
            .add_chemical(BenchId::FLASK, unit("A"), &RuleTable::new())
            .unwrap_err();
        assert_eq!(err, LabError::ReactionInProgress { id: BenchId::FLASK });
    }

    #[test]
    fn test_apparatus_has_no_container() {
        let mut bench = Bench::new(3);
        let stirrer = bench.place_apparatus("stirrer", BenchPosition::default());
        assert!(bench.container(stirrer).is_none());
        assert_eq!(
            bench.add_chemical(stirrer, unit("A"), &RuleTable::new()),
            Err(LabError::UnknownContainer { id: stirrer })
        );
        assert_eq!(bench.count_kind("stirrer"), 1);
    }

    #[test]
    fn test_clear_placed_keeps_flask() {
        let mut bench = Bench::new(3);
        bench
            .add_chemical(BenchId::FLASK, unit("A"), &RuleTable::new())
            .unwrap();
        bench.create_container("beaker", BenchPosition::default());
        bench.place_apparatus("burner", BenchPosition::default());
        bench.clear_placed();
        assert_eq!(bench.ids(), vec![BenchId::FLASK]);
        assert!(bench.container(BenchId::FLASK).unwrap().contents.is_empty());
        // ids keep counting after a clear
        assert_eq!(bench.create_container("beaker", BenchPosition::default()), BenchId(3));
    }

    #[test]
    fn test_items_roundtrip() {
        let mut bench = Bench::new(3);
        let beaker = bench.create_container("beaker", BenchPosition::snapped(41.0, 19.0));
        bench
            .add_chemical(beaker, unit("A"), &RuleTable::new())
            .unwrap();
        bench.place_apparatus("stirrer", BenchPosition::default());

        let rebuilt = Bench::from_items(bench.items(), bench.next_id(), 3);
        assert_eq!(rebuilt.items(), bench.items());
        assert_eq!(rebuilt.next_id(), bench.next_id());
        assert_eq!(rebuilt.position(beaker), Some(BenchPosition { x: 40.0, y: 20.0 }));
    }

    #[test]
    fn test_move_item() {
        let mut bench = Bench::new(3);
        let beaker = bench.create_container("beaker", BenchPosition::default());
        assert!(bench.move_item(beaker, 99.0, 12.0));
        assert_eq!(bench.position(beaker), Some(BenchPosition { x: 100.0, y: 20.0 }));
        assert!(!bench.move_item(BenchId::FLASK, 0.0, 0.0));
    }
}
