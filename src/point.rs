use std::fmt;

use serde::de::{Deserializer, Error as DeError};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

/// A cell of the planning grid, either two- or three-dimensional.
///
/// Points are immutable values; equality, hashing and ordering are
/// component-wise. The serde representation is a plain sequence of 2 or 3
/// integers, matching the configuration format's "list of d-vectors".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Point {
    Dim2 { x: i32, y: i32 },
    Dim3 { x: i32, y: i32, z: i32 },
}

impl Point {
    pub fn new_2d(x: i32, y: i32) -> Self {
        Point::Dim2 { x, y }
    }

    pub fn new_3d(x: i32, y: i32, z: i32) -> Self {
        Point::Dim3 { x, y, z }
    }

    pub fn dimension(&self) -> usize {
        match self {
            Point::Dim2 { .. } => 2,
            Point::Dim3 { .. } => 3,
        }
    }

    pub(crate) fn components(&self) -> ([i32; 3], usize) {
        match *self {
            Point::Dim2 { x, y } => ([x, y, 0], 2),
            Point::Dim3 { x, y, z } => ([x, y, z], 3),
        }
    }

    fn from_components(raw: [i32; 3], dimension: usize) -> Self {
        match dimension {
            2 => Point::Dim2 {
                x: raw[0],
                y: raw[1],
            },
            3 => Point::Dim3 {
                x: raw[0],
                y: raw[1],
                z: raw[2],
            },
            _ => panic!("unsupported point dimension {dimension}"),
        }
    }

    /// Sum of component-wise absolute differences. Mixed dimensions are a
    /// programming error once construction-time validation has run.
    pub fn manhattan_distance(&self, other: &Point) -> usize {
        let (own, own_dim) = self.components();
        let (their, their_dim) = other.components();
        assert_eq!(
            own_dim, their_dim,
            "manhattan distance between {self} and {other}"
        );

        own.iter()
            .zip(their.iter())
            .take(own_dim)
            .map(|(a, b)| a.abs_diff(*b) as usize)
            .sum()
    }

    /// Cells one unit step away, in the fixed order +x, -x, +y, -y (, +z, -z).
    /// The wait move is the search layer's concern, not the geometry's.
    pub fn neighbors(&self) -> Vec<Point> {
        let (raw, dimension) = self.components();
        let mut neighbors = Vec::with_capacity(2 * dimension);
        for axis in 0..dimension {
            for delta in [1, -1] {
                let mut moved = raw;
                moved[axis] += delta;
                neighbors.push(Point::from_components(moved, dimension));
            }
        }
        neighbors
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Point::Dim2 { x, y } => write!(f, "({x}, {y})"),
            Point::Dim3 { x, y, z } => write!(f, "({x}, {y}, {z})"),
        }
    }
}

impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (raw, dimension) = self.components();
        let mut seq = serializer.serialize_seq(Some(dimension))?;
        for component in raw.iter().take(dimension) {
            seq.serialize_element(component)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Point {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let components = Vec::<i32>::deserialize(deserializer)?;
        match components[..] {
            [x, y] => Ok(Point::Dim2 { x, y }),
            [x, y, z] => Ok(Point::Dim3 { x, y, z }),
            _ => Err(D::Error::custom(format!(
                "a point needs 2 or 3 components, got {}",
                components.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manhattan_distance() {
        let a = Point::new_2d(0, 0);
        let b = Point::new_2d(4, 4);
        assert_eq!(a.manhattan_distance(&b), 8);
        assert_eq!(b.manhattan_distance(&a), 8);

        let c = Point::new_3d(1, -2, 3);
        let d = Point::new_3d(-1, 0, 3);
        assert_eq!(c.manhattan_distance(&d), 4);
        assert_eq!(c.manhattan_distance(&c), 0);
    }

    #[test]
    fn test_neighbors_2d() {
        let neighbors = Point::new_2d(2, 2).neighbors();
        assert_eq!(
            neighbors,
            vec![
                Point::new_2d(3, 2),
                Point::new_2d(1, 2),
                Point::new_2d(2, 3),
                Point::new_2d(2, 1),
            ]
        );
    }

    #[test]
    fn test_neighbors_3d() {
        let neighbors = Point::new_3d(0, 0, 0).neighbors();
        assert_eq!(neighbors.len(), 6);
        assert!(neighbors.contains(&Point::new_3d(0, 0, -1)));
        assert!(neighbors.contains(&Point::new_3d(-1, 0, 0)));
    }

    #[test]
    fn test_yaml_round_trip() {
        let points = vec![Point::new_2d(1, 2), Point::new_3d(3, 4, 5)];
        let yaml = serde_yaml::to_string(&points).unwrap();
        let back: Vec<Point> = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(points, back);
    }

    #[test]
    fn test_rejects_bad_arity() {
        let parsed: Result<Point, _> = serde_yaml::from_str("[1, 2, 3, 4]");
        assert!(parsed.is_err());
    }
}
