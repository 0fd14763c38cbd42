//! Adaptive spatial index over a terrain raster
//!
//! The tree refines where classification changes and merges where four
//! sibling leaves agree, so large uniform regions cost a single node.
//! Built once per level layer from a `GroundSource` and persisted as a
//! JSON snapshot to skip the per-pixel rebuild on later loads.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::PersistError;
use crate::terrain::{GroundClass, GroundSource};

/// One square-ish region of the index.
///
/// Leaves carry `Some` class and no children; inner nodes carry `None`
/// and exactly four children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub class: Option<GroundClass>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<Cell>,
}

impl Cell {
    fn leaf(x: i64, y: i64, width: i64, height: i64, class: Option<GroundClass>) -> Self {
        Self {
            x,
            y,
            width,
            height,
            class,
            children: Vec::new(),
        }
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    /// Center of the cell in pixel coordinates.
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// Subdivides into four children inheriting this cell's class. Odd
    /// pixel remainders go to the bottom/right children so the children
    /// partition the parent exactly. Fails when a child would drop below
    /// the minimum leaf side.
    fn split(&mut self, min: i64) -> bool {
        let hw = self.width / 2;
        let hh = self.height / 2;
        if hw < min || hh < min {
            return false;
        }
        let rw = self.width % 2;
        let rh = self.height % 2;
        let class = self.class;
        self.children = vec![
            Cell::leaf(self.x, self.y, hw, hh, class),
            Cell::leaf(self.x, self.y + hh, hw, hh + rh, class),
            Cell::leaf(self.x + hw, self.y, hw + rw, hh, class),
            Cell::leaf(self.x + hw, self.y + hh, hw + rw, hh + rh, class),
        ];
        self.class = None;
        true
    }
}

/// Quadtree over a square domain of side `max(width, height)` pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadTree {
    width: i64,
    height: i64,
    min_leaf: i64,
    root: Cell,
}

impl QuadTree {
    /// Empty (unclassified) tree over a `width` x `height` pixel raster.
    pub fn new(width: i64, height: i64, min_leaf: i64) -> Self {
        let side = width.max(height);
        Self {
            width,
            height,
            min_leaf,
            root: Cell::leaf(0, 0, side, side, None),
        }
    }

    /// Bulk build by inserting every raster pixel.
    pub fn from_source(
        source: &dyn GroundSource,
        width: i64,
        height: i64,
        min_leaf: i64,
    ) -> Self {
        let mut tree = Self::new(width, height, min_leaf);
        for y in 0..height {
            for x in 0..width {
                tree.insert(x, y, source.classify(x, y));
            }
        }
        tree
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    pub fn height(&self) -> i64 {
        self.height
    }

    pub fn min_leaf(&self) -> i64 {
        self.min_leaf
    }

    /// Classifies the pixel at `(x, y)`.
    ///
    /// A class only ever overwrites a strictly lower one, so insertion
    /// order does not matter for the final classification. Four sibling
    /// leaves ending up with the inserted class merge back into their
    /// parent, and merges cascade up the descent path.
    pub fn insert(&mut self, x: i64, y: i64, class: GroundClass) {
        let min = self.min_leaf;
        Self::insert_into(&mut self.root, x, y, class, min);
    }

    fn insert_into(cell: &mut Cell, x: i64, y: i64, class: GroundClass, min: i64) {
        let mut same = 0;
        for child in cell.children.iter_mut() {
            if child.contains(x, y) {
                Self::insert_into(child, x, y, class, min);
            }
            if child.class == Some(class) {
                same += 1;
            }
        }
        if same == 4 {
            cell.class = Some(class);
            cell.children.clear();
            return;
        }
        if !cell.children.is_empty() {
            return;
        }
        let outranks = match cell.class {
            None => true,
            Some(cur) => class > cur,
        };
        if !outranks {
            return;
        }
        if cell.split(min) {
            for child in cell.children.iter_mut() {
                if child.contains(x, y) {
                    Self::insert_into(child, x, y, class, min);
                }
            }
        } else if cell.contains(x, y) {
            cell.class = Some(class);
        }
    }

    /// Finds the classified leaf containing `(x, y)`, or `None` when the
    /// region is still unclassified or outside the domain.
    pub fn get_leaf(&self, x: i64, y: i64) -> Option<&Cell> {
        Self::leaf_of(&self.root, x, y)
    }

    fn leaf_of(cell: &Cell, x: i64, y: i64) -> Option<&Cell> {
        if cell.class.is_some() {
            return Some(cell);
        }
        cell.children
            .iter()
            .find(|child| child.contains(x, y))
            .and_then(|child| Self::leaf_of(child, x, y))
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PersistError> {
        let file = File::open(path)?;
        let tree = serde_json::from_reader(BufReader::new(file))?;
        Ok(tree)
    }

    /// Loads a snapshot, or rebuilds from the raster when the snapshot is
    /// missing or corrupt. A rebuilt tree is re-saved on a best-effort
    /// basis; a failed save only logs.
    pub fn load_or_build(
        path: &Path,
        source: &dyn GroundSource,
        width: i64,
        height: i64,
        min_leaf: i64,
    ) -> Self {
        match Self::load(path) {
            Ok(tree) => {
                log::info!("loaded spatial index from {}", path.display());
                tree
            }
            Err(err) => {
                log::warn!(
                    "rebuilding spatial index, load from {} failed: {err}",
                    path.display()
                );
                let tree = Self::from_source(source, width, height, min_leaf);
                if let Err(err) = tree.save(path) {
                    log::warn!("could not persist index to {}: {err}", path.display());
                }
                tree
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn check_structure(cell: &Cell) {
        if cell.children.is_empty() {
            return;
        }
        assert_eq!(cell.children.len(), 4);
        assert!(cell.class.is_none(), "inner node carries a class");
        let area: i64 = cell.children.iter().map(|c| c.width * c.height).sum();
        assert_eq!(area, cell.width * cell.height, "children do not partition parent");
        let merged = cell
            .children
            .iter()
            .all(|c| c.children.is_empty() && c.class.is_some() && c.class == cell.children[0].class);
        assert!(!merged, "four identical leaves left unmerged");
        for child in &cell.children {
            check_structure(child);
        }
    }

    #[test]
    fn test_uniform_inserts_stay_one_leaf() {
        let mut tree = QuadTree::new(64, 64, 4);
        for y in 0..64 {
            for x in 0..64 {
                tree.insert(x, y, GroundClass::Open);
            }
        }
        assert!(tree.root.children.is_empty());
        assert_eq!(tree.root.class, Some(GroundClass::Open));
    }

    #[test]
    fn test_conflicting_insert_refines_to_min_size() {
        let mut tree = QuadTree::new(64, 64, 4);
        for y in 0..64 {
            for x in 0..64 {
                tree.insert(x, y, GroundClass::Open);
            }
        }
        tree.insert(0, 0, GroundClass::Wall);
        let leaf = tree.get_leaf(0, 0).unwrap();
        assert_eq!(leaf.class, Some(GroundClass::Wall));
        assert_eq!(leaf.width, 4);
        // far corner still reads the original class
        assert_eq!(tree.get_leaf(63, 63).unwrap().class, Some(GroundClass::Open));
        check_structure(&tree.root);
    }

    #[test]
    fn test_lower_priority_never_overwrites() {
        let mut tree = QuadTree::new(16, 16, 1);
        tree.insert(3, 3, GroundClass::Wall);
        tree.insert(3, 3, GroundClass::Open);
        assert_eq!(tree.get_leaf(3, 3).unwrap().class, Some(GroundClass::Wall));
    }

    #[test]
    fn test_merge_cascades_up() {
        let mut tree = QuadTree::new(8, 8, 1);
        for y in 0..8 {
            for x in 0..8 {
                tree.insert(x, y, GroundClass::Wall);
            }
        }
        assert!(tree.root.children.is_empty());
        assert_eq!(tree.root.class, Some(GroundClass::Wall));
    }

    #[test]
    fn test_unclassified_region_has_no_leaf() {
        let mut tree = QuadTree::new(64, 64, 4);
        tree.insert(1, 1, GroundClass::Wall);
        assert!(tree.get_leaf(1, 1).is_some());
        assert!(tree.get_leaf(60, 60).is_none());
    }

    #[test]
    fn test_odd_domain_partitions_exactly() {
        let mut tree = QuadTree::new(5, 5, 1);
        for y in 0..5 {
            for x in 0..5 {
                tree.insert(x, y, if x == 2 { GroundClass::Wall } else { GroundClass::Open });
            }
        }
        check_structure(&tree.root);
        for y in 0..5 {
            for x in 0..5 {
                let class = tree.get_leaf(x, y).unwrap().class.unwrap();
                let expected = if x == 2 { GroundClass::Wall } else { GroundClass::Open };
                assert_eq!(class, expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_json_snapshot_round_trip() {
        let mut tree = QuadTree::new(32, 32, 2);
        for y in 0..32 {
            for x in 0..32 {
                let class = if (x + y) % 7 == 0 { GroundClass::Wall } else { GroundClass::Open };
                tree.insert(x, y, class);
            }
        }
        let json = serde_json::to_string(&tree).unwrap();
        let restored: QuadTree = serde_json::from_str(&json).unwrap();
        assert_eq!(tree, restored);
    }

    proptest! {
        #[test]
        fn prop_insert_upholds_structure(
            points in prop::collection::vec((0i64..64, 0i64..64, 0usize..3), 1..300)
        ) {
            let classes = [GroundClass::Open, GroundClass::Ice, GroundClass::Wall];
            let mut tree = QuadTree::new(64, 64, 4);
            for (x, y, c) in points {
                tree.insert(x, y, classes[c]);
            }
            check_structure(&tree.root);
        }

        #[test]
        fn prop_highest_class_wins(
            points in prop::collection::vec(0usize..3, 1..20)
        ) {
            let classes = [GroundClass::Open, GroundClass::Ice, GroundClass::Wall];
            let mut tree = QuadTree::new(16, 16, 1);
            let mut highest: Option<GroundClass> = None;
            for c in points {
                tree.insert(5, 5, classes[c]);
                highest = highest.max(Some(classes[c]));
            }
            prop_assert_eq!(tree.get_leaf(5, 5).unwrap().class, highest);
        }
    }
}
