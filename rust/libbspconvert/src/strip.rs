use bsp::error::{BspError, BspResult};
use itertools::Itertools;
use std::collections::HashMap;

/// Largest index count a strip record can hold.
pub const DEFAULT_STRIP_BUDGET: usize = u16::MAX as usize;

/// Vertex pools beyond this size can't be addressed by strip indices.
pub const MAX_POOL_SIZE: usize = u16::MAX as usize + 1;

type EdgeKey = (u16, u16);

fn edge_key(a: u16, b: u16) -> EdgeKey {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Connection to a neighbouring polygon through a shared edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Link {
    polygon: usize,
    edge: EdgeKey,
}

/// Joins polygons sharing edges into chains and walks each chain as one
/// triangle strip.
pub struct StripBuilder<'a> {
    loops: &'a [Vec<u16>],
    prev: Vec<Option<Link>>,
    next: Vec<Option<Link>>,
    chain: Vec<usize>,
}

impl<'a> StripBuilder<'a> {
    pub fn new(loops: &'a [Vec<u16>]) -> StripBuilder<'a> {
        StripBuilder {
            loops,
            prev: vec![None; loops.len()],
            next: vec![None; loops.len()],
            chain: (0..loops.len()).collect(),
        }
    }

    /// Links polygons until no more chains can be merged and returns the
    /// chains, each as its polygons from head to tail.
    pub fn chains(&mut self) -> Vec<Vec<usize>> {
        let mut sharing: HashMap<EdgeKey, Vec<usize>> = HashMap::new();
        let mut edges = vec![];
        for (polygon, indices) in self.loops.iter().enumerate() {
            for (a, b) in indices.iter().copied().circular_tuple_windows() {
                let key = edge_key(a, b);
                let polygons = sharing.entry(key).or_default();
                if !polygons.contains(&polygon) {
                    polygons.push(polygon);
                }
                edges.push((polygon, key));
            }
        }

        loop {
            let mut merged = false;
            for (polygon, key) in &edges {
                for other in &sharing[key] {
                    if *other != *polygon && self.try_link(*polygon, *other, *key) {
                        merged = true;
                    }
                }
            }
            if !merged {
                break;
            }
        }

        (0..self.loops.len())
            .filter(|polygon| self.prev[*polygon].is_none())
            .map(|head| {
                let mut chain = vec![head];
                let mut cursor = head;
                while let Some(link) = self.next[cursor] {
                    cursor = link.polygon;
                    chain.push(cursor);
                }
                chain
            })
            .collect()
    }

    fn is_end(&self, polygon: usize) -> bool {
        self.prev[polygon].is_none() || self.next[polygon].is_none()
    }

    fn uses_edge(&self, polygon: usize, edge: EdgeKey) -> bool {
        self.prev[polygon].map_or(false, |link| link.edge == edge)
            || self.next[polygon].map_or(false, |link| link.edge == edge)
    }

    fn try_link(&mut self, from: usize, to: usize, edge: EdgeKey) -> bool {
        if self.find(from) == self.find(to)
            || !self.is_end(from)
            || !self.is_end(to)
            || self.uses_edge(from, edge)
            || self.uses_edge(to, edge)
        {
            return false;
        }

        // `from` becomes its chain's tail and `to` its chain's head.
        if self.next[from].is_some() {
            self.reverse_chain(from);
        }
        if self.prev[to].is_some() {
            self.reverse_chain(to);
        }
        self.next[from] = Some(Link { polygon: to, edge });
        self.prev[to] = Some(Link {
            polygon: from,
            edge,
        });

        let (a, b) = (self.find(from), self.find(to));
        self.chain[b] = a;
        true
    }

    fn reverse_chain(&mut self, member: usize) {
        let mut head = member;
        while let Some(link) = self.prev[head] {
            head = link.polygon;
        }
        let mut cursor = Some(head);
        while let Some(polygon) = cursor {
            cursor = self.next[polygon].map(|link| link.polygon);
            std::mem::swap(&mut self.prev[polygon], &mut self.next[polygon]);
        }
    }

    fn find(&mut self, mut polygon: usize) -> usize {
        while self.chain[polygon] != polygon {
            self.chain[polygon] = self.chain[self.chain[polygon]];
            polygon = self.chain[polygon];
        }
        polygon
    }

    /// One strip per chain. Call after `chains`.
    pub fn emit(&self, chain: &[usize]) -> Vec<u16> {
        let mut strip = vec![];
        for (position, polygon) in chain.iter().enumerate() {
            let indices = &self.loops[*polygon];
            let n = indices.len();
            let exit = self.next[*polygon].map(|link| edge_position(indices, link.edge));

            let entry = if position == 0 {
                let seed = exit.map_or(0, |exit| (exit + n / 2) % n);
                strip.push(indices[seed]);
                strip.push(indices[(seed + 1) % n]);
                seed
            } else {
                self.prev[*polygon].map_or(0, |link| edge_position(indices, link.edge))
            };
            walk_polygon(indices, entry, exit, &mut strip);
        }
        strip
    }
}

/// Position `i` such that the edge `(loop[i], loop[i + 1])` is `edge`.
fn edge_position(indices: &[u16], edge: EdgeKey) -> usize {
    let found = indices
        .iter()
        .copied()
        .circular_tuple_windows()
        .position(|(a, b)| edge_key(a, b) == edge);
    debug_assert!(found.is_some(), "link edge {:?} not on polygon", edge);
    found.unwrap_or(0)
}

/// Consumes one polygon whose entry edge `(loop[entry], loop[entry + 1])`
/// ends the strip, leaving the exit edge (if any) as the last two indices.
fn walk_polygon(indices: &[u16], entry: usize, exit: Option<usize>, strip: &mut Vec<u16>) {
    let n = indices.len();
    // Frontier positions: `left` walks forward, `right` backward.
    let mut left = (entry + 1) % n;
    let mut right = entry;
    let total = n - 2;
    let (mut left_budget, mut right_budget) = match exit {
        Some(exit) => {
            let ahead = (exit + n - left) % n;
            (ahead, total - ahead)
        }
        None => (total, total),
    };

    for _ in 0..total {
        let older = strip[strip.len() - 2];
        let prefer_left = indices[left] == older;
        let take_left = if prefer_left {
            left_budget > 0 || right_budget == 0
        } else {
            right_budget == 0
        };

        if take_left {
            left = (left + 1) % n;
            push_keeping(strip, indices[right], indices[left]);
            left_budget = left_budget.saturating_sub(1);
            if exit.is_none() {
                right_budget = right_budget.saturating_sub(1);
            }
        } else {
            right = (right + n - 1) % n;
            push_keeping(strip, indices[left], indices[right]);
            right_budget = right_budget.saturating_sub(1);
            if exit.is_none() {
                left_budget = left_budget.saturating_sub(1);
            }
        }
    }
}

/// Appends `vertex` so that the new triangle uses `keep`, swapping with a
/// degenerate triangle when `keep` is not the newest index.
fn push_keeping(strip: &mut Vec<u16>, keep: u16, vertex: u16) {
    if strip.last() != Some(&keep) {
        strip.push(strip[strip.len() - 2]);
    }
    strip.push(vertex);
}

/// Cuts a strip into pieces of at most `budget` indices. Every piece after
/// the first starts with the previous piece's last two indices.
pub fn split_strip(strip: Vec<u16>, budget: usize) -> Vec<Vec<u16>> {
    let budget = (budget & !1).max(4);
    if strip.len() <= budget {
        return vec![strip];
    }

    let mut pieces = vec![];
    let mut start = 0;
    loop {
        let end = (start + budget).min(strip.len());
        pieces.push(strip[start..end].to_vec());
        if end == strip.len() {
            break;
        }
        start = end - 2;
    }
    pieces
}

/// Builds strips covering every loop. Loops index a vertex pool of
/// `pool_size` entries.
pub fn build_strips(
    loops: &[Vec<u16>],
    pool_size: usize,
    budget: usize,
) -> BspResult<Vec<Vec<u16>>> {
    if pool_size > MAX_POOL_SIZE {
        return Err(BspError::CapacityExceeded {
            what: "polygon vertices",
            needed: pool_size,
            limit: MAX_POOL_SIZE,
        });
    }

    let mut builder = StripBuilder::new(loops);
    let chains = builder.chains();
    Ok(chains
        .iter()
        .flat_map(|chain| split_strip(builder.emit(chain), budget))
        .collect())
}

/// Non-degenerate triangles of a strip, each in the strip's winding.
pub fn strip_triangles(strip: &[u16]) -> Vec<[u16; 3]> {
    strip
        .windows(3)
        .enumerate()
        .filter(|(_, t)| t[0] != t[1] && t[1] != t[2] && t[0] != t[2])
        .map(|(i, t)| {
            if i % 2 == 0 {
                [t[0], t[1], t[2]]
            } else {
                [t[1], t[0], t[2]]
            }
        })
        .collect()
}
