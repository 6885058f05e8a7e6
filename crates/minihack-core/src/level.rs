//! Level description builder.
//!
//! Builds the textual level program the engine loads at episode start:
//!
//! ```text
//! MAZE: "mylevel", ' '
//! INIT_MAP:solidfill,' '
//! GEOMETRY:center,center
//! MAP
//! .....
//! ENDMAP
//! REGION:(0,0,5,5),lit,"ordinary"
//! OBJECT:('%',"apple"),random
//! ALTAR:random,neutral,altar
//! ```
//!
//! # Example
//!
//! ```
//! use minihack_core::{LevelBuilder, Location};
//!
//! let mut builder = LevelBuilder::empty(5, 5, true);
//! builder.add_object("apple", "%", Location::Random).unwrap();
//! builder.add_altar(Location::coord(2, 3)).unwrap();
//!
//! let level = builder.build();
//! assert!(level.des().contains("OBJECT:('%',\"apple\"),random"));
//! assert!(level.des().contains("ALTAR:(2,3),neutral,altar"));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

const HEADER: &str = "\nMAZE: \"mylevel\", ' '\nINIT_MAP:solidfill,' '\nGEOMETRY:center,center\n";
const FLOOR: char = '.';

/// Default width and height of a generated level.
pub const DEFAULT_LEVEL_SIZE: usize = 8;

/// Symbol used for objects when a task does not name one (comestibles).
pub const DEFAULT_OBJECT_SYMBOL: &str = "%";

/// Errors raised while building a level description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LevelError {
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    #[error("invalid object symbol '{0}': expected exactly one character")]
    InvalidSymbol(String),

    #[error("invalid object name '{0}'")]
    InvalidName(String),

    #[error("level already has an altar")]
    DuplicateAltar,
}

/// Where the engine places an object or feature.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "serde_yaml::Value")]
pub enum Location {
    /// Anywhere the engine chooses.
    #[default]
    Random,
    /// A fixed map coordinate.
    Coordinate { x: i32, y: i32 },
    /// An engine placement expression passed through verbatim.
    Raw(String),
}

impl Location {
    /// Creates a coordinate location.
    pub fn coord(x: i32, y: i32) -> Self {
        Location::Coordinate { x, y }
    }

    /// Creates a pass-through location expression.
    pub fn raw(expr: impl Into<String>) -> Self {
        Location::Raw(expr.into())
    }

    fn validate(&self) -> Result<(), LevelError> {
        match self {
            Location::Raw(expr) if expr.trim().is_empty() || expr.contains(['\n', '\r']) => {
                Err(LevelError::InvalidLocation(format!("{:?}", expr)))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Random => f.write_str("random"),
            Location::Coordinate { x, y } => write!(f, "({},{})", x, y),
            Location::Raw(expr) => f.write_str(expr),
        }
    }
}

impl TryFrom<serde_yaml::Value> for Location {
    type Error = LevelError;

    /// Accepts `~` (random), a two-element integer sequence or a string.
    fn try_from(value: serde_yaml::Value) -> Result<Self, Self::Error> {
        use serde_yaml::Value;

        let invalid = |value: &Value| LevelError::InvalidLocation(format!("{:?}", value));

        let location = match &value {
            Value::Null => Location::Random,
            Value::String(expr) => Location::Raw(expr.clone()),
            Value::Sequence(items) if items.len() == 2 => {
                let coord = |item: &Value| item.as_i64().and_then(|n| i32::try_from(n).ok());
                match (coord(&items[0]), coord(&items[1])) {
                    (Some(x), Some(y)) => Location::Coordinate { x, y },
                    _ => return Err(invalid(&value)),
                }
            }
            _ => return Err(invalid(&value)),
        };
        location.validate()?;
        Ok(location)
    }
}

impl Serialize for Location {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Location::Random => serializer.serialize_unit(),
            Location::Coordinate { x, y } => (x, y).serialize(serializer),
            Location::Raw(expr) => serializer.serialize_str(expr),
        }
    }
}

/// A finished level program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSpec {
    des: String,
    x: usize,
    y: usize,
}

impl LevelSpec {
    /// Returns the level program text.
    pub fn des(&self) -> &str {
        &self.des
    }

    /// Number of map rows.
    pub fn x(&self) -> usize {
        self.x
    }

    /// Length of the longest map row.
    pub fn y(&self) -> usize {
        self.y
    }
}

impl fmt::Display for LevelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.des)
    }
}

/// Accumulates level declarations.
#[derive(Debug, Clone)]
pub struct LevelBuilder {
    des: String,
    x: usize,
    y: usize,
    has_altar: bool,
}

impl Default for LevelBuilder {
    fn default() -> Self {
        Self::empty(DEFAULT_LEVEL_SIZE, DEFAULT_LEVEL_SIZE, true)
    }
}

impl LevelBuilder {
    /// Starts a level from a caller-supplied character grid.
    ///
    /// The grid is embedded verbatim. `x` is its line count and `y` the
    /// length of its longest line.
    pub fn from_map(grid: &str) -> Self {
        let x = grid.lines().count();
        let y = grid.lines().map(|line| line.chars().count()).max().unwrap_or(0);

        let mut des = String::from(HEADER);
        push_map(&mut des, grid);

        Self {
            des,
            x,
            y,
            has_altar: false,
        }
    }

    /// Starts a level with a `height` x `width` room of floor tiles.
    pub fn empty(width: usize, height: usize, lit: bool) -> Self {
        let row: String = std::iter::repeat_n(FLOOR, width).chain(['\n']).collect();
        let grid = row.repeat(height);

        let mut des = String::from(HEADER);
        push_map(&mut des, &grid);
        // The region is written as (0,0,x,y) with x the row count, matching
        // the x/y convention of the level dimensions.
        des.push_str(&format!(
            "REGION:(0,0,{},{}),{},\"ordinary\"\n",
            height,
            width,
            if lit { "lit" } else { "unlit" }
        ));

        Self {
            des,
            x: height,
            y: width,
            has_altar: false,
        }
    }

    /// Places an object.
    ///
    /// The name is not checked against the engine's object catalogue; unknown
    /// names surface when the engine loads the level.
    pub fn add_object(
        &mut self,
        name: &str,
        symbol: &str,
        loc: Location,
    ) -> Result<&mut Self, LevelError> {
        loc.validate()?;

        let mut chars = symbol.chars();
        let valid_symbol = matches!(
            (chars.next(), chars.next()),
            (Some(c), None) if !matches!(c, '\'' | '\n' | '\r')
        );
        if !valid_symbol {
            return Err(LevelError::InvalidSymbol(symbol.to_string()));
        }

        if name.trim().is_empty() || name.contains(['"', '\n', '\r']) {
            return Err(LevelError::InvalidName(name.to_string()));
        }

        self.des.push_str(&format!("OBJECT:('{}',\"{}\"),{}\n", symbol, name, loc));
        Ok(self)
    }

    /// Places the level's single altar (neutral alignment).
    pub fn add_altar(&mut self, loc: Location) -> Result<&mut Self, LevelError> {
        loc.validate()?;
        if self.has_altar {
            return Err(LevelError::DuplicateAltar);
        }

        self.des.push_str(&format!("ALTAR:{},neutral,altar\n", loc));
        self.has_altar = true;
        Ok(self)
    }

    /// Returns the level program accumulated so far.
    pub fn build(&self) -> LevelSpec {
        LevelSpec {
            des: self.des.clone(),
            x: self.x,
            y: self.y,
        }
    }
}

fn push_map(des: &mut String, grid: &str) {
    des.push_str("MAP\n");
    des.push_str(grid);
    if !grid.is_empty() && !grid.ends_with('\n') {
        des.push('\n');
    }
    des.push_str("ENDMAP\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_dimensions_from_grid() {
        let grid = "-----\n|...|\n|.......\n-----\n";
        let level = LevelBuilder::from_map(grid).build();
        assert_eq!(level.x(), 4);
        assert_eq!(level.y(), 8);
        assert!(level.des().contains("MAP\n-----\n|...|\n|.......\n-----\nENDMAP\n"));
        assert!(!level.des().contains("REGION"));
    }

    #[test]
    fn test_map_without_trailing_newline() {
        let level = LevelBuilder::from_map("...\n..").build();
        assert_eq!(level.x(), 2);
        assert_eq!(level.y(), 3);
        assert!(level.des().ends_with("..\nENDMAP\n"));
    }

    #[test]
    fn test_empty_level_layout() {
        let level = LevelBuilder::empty(5, 5, true).build();
        assert_eq!(level.x(), 5);
        assert_eq!(level.y(), 5);

        let expected = format!(
            "{}MAP\n{}ENDMAP\nREGION:(0,0,5,5),lit,\"ordinary\"\n",
            HEADER,
            ".....\n".repeat(5)
        );
        assert_eq!(level.des(), expected);
    }

    #[test]
    fn test_unlit_region() {
        let level = LevelBuilder::empty(3, 2, false).build();
        assert_eq!(level.x(), 2);
        assert_eq!(level.y(), 3);
        assert!(level.des().contains("...\n...\nENDMAP"));
        assert!(level.des().contains("REGION:(0,0,2,3),unlit,\"ordinary\""));
    }

    #[test]
    fn test_default_is_eight_by_eight_lit() {
        let level = LevelBuilder::default().build();
        assert_eq!((level.x(), level.y()), (8, 8));
        assert!(level.des().contains(",lit,"));
    }

    #[test]
    fn test_object_locations_serialize() {
        let mut builder = LevelBuilder::empty(5, 5, true);
        builder
            .add_object("apple", "%", Location::Random)
            .unwrap()
            .add_object("key", "(", Location::coord(3, 4))
            .unwrap()
            .add_object("orange", "%", Location::raw("levregion(1,1,3,3)"))
            .unwrap();

        let des = builder.build().des().to_string();
        assert!(des.contains("OBJECT:('%',\"apple\"),random\n"));
        assert!(des.contains("OBJECT:('(',\"key\"),(3,4)\n"));
        assert!(des.contains("OBJECT:('%',\"orange\"),levregion(1,1,3,3)\n"));
    }

    #[test]
    fn test_invalid_symbol_rejected() {
        let mut builder = LevelBuilder::default();
        assert_eq!(
            builder.add_object("apple", "ab", Location::Random).unwrap_err(),
            LevelError::InvalidSymbol("ab".to_string())
        );
        assert!(matches!(
            builder.add_object("apple", "", Location::Random),
            Err(LevelError::InvalidSymbol(_))
        ));
        assert!(matches!(
            builder.add_object("apple", "'", Location::Random),
            Err(LevelError::InvalidSymbol(_))
        ));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut builder = LevelBuilder::default();
        assert!(matches!(
            builder.add_object("", "%", Location::Random),
            Err(LevelError::InvalidName(_))
        ));
        assert!(matches!(
            builder.add_object("bad\"name", "%", Location::Random),
            Err(LevelError::InvalidName(_))
        ));
    }

    #[test]
    fn test_invalid_raw_location_rejected() {
        let mut builder = LevelBuilder::default();
        assert!(matches!(
            builder.add_object("apple", "%", Location::raw("")),
            Err(LevelError::InvalidLocation(_))
        ));
        assert!(matches!(
            builder.add_altar(Location::raw("(1,1)\nOBJECT")),
            Err(LevelError::InvalidLocation(_))
        ));
    }

    #[test]
    fn test_failed_add_leaves_program_unchanged() {
        let mut builder = LevelBuilder::default();
        let before = builder.build();
        let _ = builder.add_object("apple", "ab", Location::Random);
        assert_eq!(builder.build(), before);
    }

    #[test]
    fn test_altar_declared_once() {
        let mut builder = LevelBuilder::empty(5, 5, true);
        builder.add_altar(Location::Random).unwrap();
        assert!(builder.build().des().ends_with("ALTAR:random,neutral,altar\n"));
        assert_eq!(
            builder.add_altar(Location::coord(1, 1)).unwrap_err(),
            LevelError::DuplicateAltar
        );
    }

    #[test]
    fn test_build_is_repeatable() {
        let mut builder = LevelBuilder::empty(4, 4, true);
        builder.add_object("carrot", "%", Location::Random).unwrap();
        assert_eq!(builder.build(), builder.build());
    }

    #[test]
    fn test_location_from_yaml() {
        let random: Location = serde_yaml::from_str("~").unwrap();
        assert_eq!(random, Location::Random);

        let coord: Location = serde_yaml::from_str("[3, 4]").unwrap();
        assert_eq!(coord.to_string(), "(3,4)");

        let raw: Location = serde_yaml::from_str("\"place[0]\"").unwrap();
        assert_eq!(raw, Location::raw("place[0]"));
    }

    #[test]
    fn test_location_integer_is_invalid() {
        let value: serde_yaml::Value = serde_yaml::from_str("42").unwrap();
        assert!(matches!(
            Location::try_from(value),
            Err(LevelError::InvalidLocation(_))
        ));

        let triple: serde_yaml::Value = serde_yaml::from_str("[1, 2, 3]").unwrap();
        assert!(matches!(
            Location::try_from(triple),
            Err(LevelError::InvalidLocation(_))
        ));

        assert!(serde_yaml::from_str::<Location>("42").is_err());
    }

    #[test]
    fn test_location_serializes_back() {
        assert_eq!(serde_yaml::to_string(&Location::Random).unwrap().trim(), "null");
        let yaml = serde_yaml::to_string(&Location::coord(1, 2)).unwrap();
        let coord: Location = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(coord, Location::coord(1, 2));
    }
}
