//! Decision path bookkeeping for TreeSHAP.
//!
//! Tracks, for the unique features split on between the root and the
//! current node, the fraction of "zero" paths (feature absent from the
//! coalition) and "one" paths (feature present) flowing through, together
//! with the permutation weights of every coalition size.

/// One unique feature on the current path
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PathElement {
    /// Feature split on, `None` for the root placeholder
    pub feature: Option<usize>,
    /// Fraction of training cover flowing this way
    pub zero_fraction: f64,
    /// 1.0 if the sample flows this way, else 0.0
    pub one_fraction: f64,
    /// Permutation weight for coalitions of this size
    pub pweight: f64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Path {
    elements: Vec<PathElement>,
}

impl Path {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elements: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn element(&self, index: usize) -> PathElement {
        self.elements[index]
    }

    /// Position of `feature` on the path
    pub fn find(&self, feature: usize) -> Option<usize> {
        self.elements.iter().position(|e| e.feature == Some(feature))
    }

    /// Append a feature and update permutation weights
    pub fn extend(&mut self, feature: Option<usize>, zero_fraction: f64, one_fraction: f64) {
        let depth = self.elements.len();
        self.elements.push(PathElement {
            feature,
            zero_fraction,
            one_fraction,
            pweight: if depth == 0 { 1.0 } else { 0.0 },
        });

        let denom = (depth + 1) as f64;
        for i in (0..depth).rev() {
            let w = self.elements[i].pweight;
            self.elements[i + 1].pweight += one_fraction * w * (i + 1) as f64 / denom;
            self.elements[i].pweight = zero_fraction * w * (depth - i) as f64 / denom;
        }
    }

    /// Remove the element at `index`, undoing its effect on the weights
    pub fn unwind(&mut self, index: usize) {
        let depth = self.elements.len() - 1;
        let PathElement {
            zero_fraction,
            one_fraction,
            ..
        } = self.elements[index];
        let denom = (depth + 1) as f64;

        let mut next_one_portion = self.elements[depth].pweight;
        for i in (0..depth).rev() {
            if one_fraction != 0.0 {
                let tmp = self.elements[i].pweight;
                self.elements[i].pweight = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
                next_one_portion =
                    tmp - self.elements[i].pweight * zero_fraction * (depth - i) as f64 / denom;
            } else {
                self.elements[i].pweight =
                    self.elements[i].pweight * denom / (zero_fraction * (depth - i) as f64);
            }
        }

        for i in index..depth {
            self.elements[i].feature = self.elements[i + 1].feature;
            self.elements[i].zero_fraction = self.elements[i + 1].zero_fraction;
            self.elements[i].one_fraction = self.elements[i + 1].one_fraction;
        }
        self.elements.pop();
    }

    /// Total permutation weight if the element at `index` were unwound
    pub fn unwound_sum(&self, index: usize) -> f64 {
        let depth = self.elements.len() - 1;
        let PathElement {
            zero_fraction,
            one_fraction,
            ..
        } = self.elements[index];
        let denom = (depth + 1) as f64;

        let mut total = 0.0;
        let mut next_one_portion = self.elements[depth].pweight;
        for i in (0..depth).rev() {
            if one_fraction != 0.0 {
                let tmp = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
                total += tmp;
                next_one_portion =
                    self.elements[i].pweight - tmp * zero_fraction * (depth - i) as f64 / denom;
            } else if zero_fraction != 0.0 {
                total += self.elements[i].pweight / zero_fraction / ((depth - i) as f64 / denom);
            }
        }
        total
    }
}
