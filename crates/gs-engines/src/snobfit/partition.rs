//! Point merging and the recursive box partition.
//!
//! All coordinates here are in the unit cube.

/// Leaf box of the partition, holding exactly one point.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub point: usize,
    pub low: Vec<f64>,
    pub high: Vec<f64>,
    /// Number of splits from the root to this box.
    pub depth: usize,
}

impl Cell {
    pub fn volume(&self) -> f64 {
        self.low
            .iter()
            .zip(&self.high)
            .map(|(l, h)| h - l)
            .product()
    }

    pub fn centre(&self) -> Vec<f64> {
        self.low
            .iter()
            .zip(&self.high)
            .map(|(l, h)| 0.5 * (l + h))
            .collect()
    }

    pub fn widths(&self) -> Vec<f64> {
        self.low.iter().zip(&self.high).map(|(l, h)| h - l).collect()
    }
}

/// True when every coordinate differs by at most `dx`.
pub fn within(a: &[f64], b: &[f64], dx: &[f64]) -> bool {
    a.iter()
        .zip(b)
        .zip(dx)
        .all(|((x, y), d)| (x - y).abs() <= *d)
}

/// Collapse points closer than `dx` in every coordinate, keeping the one with
/// the lower value.  Returns indices into the input, in first-seen order.
pub fn merge(x: &[Vec<f64>], f: &[f64], dx: &[f64]) -> Vec<usize> {
    let mut kept: Vec<usize> = Vec::with_capacity(x.len());
    for i in 0..x.len() {
        match kept.iter().position(|&k| within(&x[k], &x[i], dx)) {
            Some(pos) => {
                if f[i] < f[kept[pos]] {
                    kept[pos] = i;
                }
            }
            None => kept.push(i),
        }
    }
    kept
}

/// Split the unit cube until each box holds one of `points`.
///
/// A box with several points is cut along the coordinate with the widest
/// spread relative to the box width, at the midpoint of the largest gap
/// between neighbouring points on that coordinate.
pub fn partition(x: &[Vec<f64>], points: &[usize], dims: usize) -> Vec<Cell> {
    let mut cells = Vec::with_capacity(points.len());
    let mut stack = vec![(points.to_vec(), vec![0.0; dims], vec![1.0; dims], 0usize)];

    while let Some((members, low, high, depth)) = stack.pop() {
        if members.len() <= 1 {
            if let Some(&point) = members.first() {
                cells.push(Cell {
                    point,
                    low,
                    high,
                    depth,
                });
            }
            continue;
        }

        let Some((axis, cut)) = choose_cut(x, &members, &low, &high) else {
            // indistinguishable points; keep the first, the rest were merged upstream
            cells.push(Cell {
                point: members[0],
                low,
                high,
                depth,
            });
            continue;
        };

        let (left, right): (Vec<usize>, Vec<usize>) =
            members.into_iter().partition(|&i| x[i][axis] <= cut);
        let mut left_high = high.clone();
        left_high[axis] = cut;
        let mut right_low = low.clone();
        right_low[axis] = cut;

        stack.push((right, right_low, high, depth + 1));
        stack.push((left, low, left_high, depth + 1));
    }

    cells.sort_by_key(|c| c.point);
    cells
}

fn choose_cut(x: &[Vec<f64>], members: &[usize], low: &[f64], high: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for axis in 0..low.len() {
        let width = high[axis] - low[axis];
        if width <= 0.0 {
            continue;
        }
        let (lo, hi) = members.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
            (lo.min(x[i][axis]), hi.max(x[i][axis]))
        });
        let spread = (hi - lo) / width;
        if spread > 0.0 && best.map_or(true, |(_, s)| spread > s) {
            best = Some((axis, spread));
        }
    }
    let (axis, _) = best?;

    let mut values: Vec<f64> = members.iter().map(|&i| x[i][axis]).collect();
    values.sort_by(|a, b| a.total_cmp(b));
    let (gap_at, _) = values
        .windows(2)
        .enumerate()
        .map(|(k, w)| (k, w[1] - w[0]))
        .fold((0, f64::NEG_INFINITY), |acc, (k, g)| if g > acc.1 { (k, g) } else { acc });
    Some((axis, 0.5 * (values[gap_at] + values[gap_at + 1])))
}
