//! Grid patterns - the shared secret a user traces to unlock
//!
//! A pattern is an ordered walk over the nodes of a fixed grid. Nodes are
//! numbered row by row:
//!
//! ```text
//!   0 ─ 1 ─ 2
//!   │   │   │
//!   3 ─ 4 ─ 5
//!   │   │   │
//!   6 ─ 7 ─ 8
//! ```
//!
//! Order matters (`[0,1,2]` and `[2,1,0]` are different secrets) and a node
//! can be visited only once.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::str::FromStr;
use zeroize::{Zeroize, Zeroizing};

/// Index of a node on the grid, counted row by row from the top-left
pub type NodeId = u8;

/// Separator placed between node ids when a pattern is turned into KDF input
pub const PASSWORD_DELIMITER: char = ',';

/// Fixed-size grid the pattern is drawn on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub rows: u8,
    pub cols: u8,
}

impl Grid {
    pub const fn new(rows: u8, cols: u8) -> Self {
        Self { rows, cols }
    }

    /// Square grid with `n` nodes per side
    pub const fn square(n: u8) -> Self {
        Self { rows: n, cols: n }
    }

    /// Number of nodes on the grid
    pub fn cells(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Whether `id` names a node of this grid
    pub fn contains(&self, id: NodeId) -> bool {
        (id as usize) < self.cells()
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::square(3)
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Why a pattern was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("Pattern is empty")]
    Empty,

    #[error("Pattern too short: need at least {min} nodes, got {got}")]
    TooShort { min: usize, got: usize },

    #[error("Node {id} is outside the {grid} grid")]
    OutOfGrid { id: NodeId, grid: Grid },

    #[error("Node {0} is used more than once")]
    Repeated(NodeId),

    #[error("Cannot parse pattern: {0}")]
    Parse(String),
}

/// An ordered, non-repeating walk over grid nodes
///
/// This is secret material. `Debug` only reveals the length and the node
/// ids are wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct Pattern {
    nodes: Vec<NodeId>,
}

impl Zeroize for Pattern {
    fn zeroize(&mut self) {
        self.nodes.zeroize();
    }
}

impl Drop for Pattern {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl Pattern {
    /// Build a pattern on the default 3x3 grid
    pub fn new(nodes: Vec<NodeId>) -> Result<Self, PatternError> {
        Self::on_grid(nodes, Grid::default())
    }

    /// Build a pattern on a specific grid
    pub fn on_grid(nodes: Vec<NodeId>, grid: Grid) -> Result<Self, PatternError> {
        // Wrap first so a rejected walk is still wiped on drop
        let pattern = Self { nodes };
        pattern.validate(grid)?;
        Ok(pattern)
    }

    fn validate(&self, grid: Grid) -> Result<(), PatternError> {
        if self.nodes.is_empty() {
            return Err(PatternError::Empty);
        }

        let mut seen = vec![false; grid.cells()];
        for &id in &self.nodes {
            if !grid.contains(id) {
                return Err(PatternError::OutOfGrid { id, grid });
            }
            if seen[id as usize] {
                return Err(PatternError::Repeated(id));
            }
            seen[id as usize] = true;
        }

        Ok(())
    }

    /// Node ids in tracing order
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// UTF-8 text fed to the KDF: decimal ids joined by `,`
    pub fn password(&self) -> Zeroizing<String> {
        let mut password = Zeroizing::new(String::with_capacity(self.nodes.len() * 4));
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                password.push(PASSWORD_DELIMITER);
            }
            // Writing into a String cannot fail
            let _ = write!(password, "{}", node);
        }
        password
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern(len: {})", self.nodes.len())
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    /// Parse `0,1,2`, `0-1-2` or `0 1 2` on the default grid
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(parse_nodes(s)?)
    }
}

fn parse_nodes(s: &str) -> Result<Vec<NodeId>, PatternError> {
    let mut nodes = Vec::new();
    for token in s.split(|c: char| c == ',' || c == '-' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        let id = token
            .parse::<NodeId>()
            .map_err(|_| PatternError::Parse(format!("'{}' is not a node id", token)))?;
        nodes.push(id);
    }
    Ok(nodes)
}

/// Acceptance rules applied when a new pattern is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternPolicy {
    /// Grid the pattern must be drawn on
    pub grid: Grid,
    /// Minimum number of nodes
    pub min_length: usize,
}

impl Default for PatternPolicy {
    fn default() -> Self {
        Self {
            grid: Grid::default(),
            min_length: 1,
        }
    }
}

impl PatternPolicy {
    /// Check an already-built pattern against this policy
    pub fn check(&self, pattern: &Pattern) -> Result<(), PatternError> {
        pattern.validate(self.grid)?;
        if pattern.len() < self.min_length {
            return Err(PatternError::TooShort {
                min: self.min_length,
                got: pattern.len(),
            });
        }
        Ok(())
    }

    /// Parse text into a pattern that satisfies this policy
    pub fn parse(&self, s: &str) -> Result<Pattern, PatternError> {
        let pattern = Pattern::on_grid(parse_nodes(s)?, self.grid)?;
        self.check(&pattern)?;
        Ok(pattern)
    }
}
