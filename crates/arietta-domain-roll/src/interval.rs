use arietta_ports::types::Tick;

/// A labelled inclusive span `[start, end]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span<L> {
    pub start: Tick,
    pub end: Tick,
    pub label: L,
}

/// Range-insert / point-query index over possibly overlapping spans.
///
/// Built once per recording and queried many times: `insert` appends,
/// `freeze` arranges the spans as an implicit balanced BST (start-sorted,
/// max-end augmented) so that `query` prunes in O(log n + k). Queries before
/// `freeze` fall back to a linear scan, so the index is never wrong, only
/// slower.
#[derive(Clone, Debug)]
pub struct IntervalIndex<L> {
    spans: Vec<Span<L>>,
    subtree_max_end: Vec<Tick>,
}

// derived Default would require L: Default; labels need no such bound
impl<L> Default for IntervalIndex<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> IntervalIndex<L> {
    pub fn new() -> Self {
        Self {
            spans: Vec::new(),
            subtree_max_end: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Both ends inclusive. Spans with `end < start` are normalized to a
    /// single-point span at `start`.
    pub fn insert(&mut self, start: Tick, end: Tick, label: L) {
        let end = end.max(start);
        self.spans.push(Span { start, end, label });
        self.subtree_max_end.clear();
    }

    pub fn freeze(&mut self) {
        self.spans.sort_by_key(|span| (span.start, span.end));
        self.subtree_max_end = vec![Tick::MIN; self.spans.len()];
        if !self.spans.is_empty() {
            self.compute_max_end(0, self.spans.len());
        }
    }

    fn compute_max_end(&mut self, lo: usize, hi: usize) -> Tick {
        if lo >= hi {
            return Tick::MIN;
        }
        let mid = lo + (hi - lo) / 2;
        let mut max_end = self.spans[mid].end;
        max_end = max_end.max(self.compute_max_end(lo, mid));
        max_end = max_end.max(self.compute_max_end(mid + 1, hi));
        self.subtree_max_end[mid] = max_end;
        max_end
    }

    fn is_frozen(&self) -> bool {
        self.subtree_max_end.len() == self.spans.len() && !self.spans.is_empty()
    }

    /// All labels whose span covers `point`.
    pub fn query(&self, point: Tick) -> Vec<&L> {
        let mut out = Vec::new();
        if self.is_frozen() {
            self.query_node(0, self.spans.len(), point, point, &mut out);
        } else {
            for span in &self.spans {
                if span.start <= point && point <= span.end {
                    out.push(&span.label);
                }
            }
        }
        out
    }

    /// All labels whose span intersects the inclusive window `[start, end]`.
    pub fn query_range(&self, start: Tick, end: Tick) -> Vec<&L> {
        let end = end.max(start);
        let mut out = Vec::new();
        if self.is_frozen() {
            self.query_node(0, self.spans.len(), start, end, &mut out);
        } else {
            for span in &self.spans {
                if span.start <= end && start <= span.end {
                    out.push(&span.label);
                }
            }
        }
        out
    }

    fn query_node<'a>(&'a self, lo: usize, hi: usize, start: Tick, end: Tick, out: &mut Vec<&'a L>) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        if self.subtree_max_end[mid] < start {
            // nothing in this subtree reaches the window
            return;
        }
        self.query_node(lo, mid, start, end, out);
        let span = &self.spans[mid];
        if span.start <= end && start <= span.end {
            out.push(&span.label);
        }
        if span.start <= end {
            self.query_node(mid + 1, hi, start, end, out);
        }
    }

    pub fn spans(&self) -> &[Span<L>] {
        &self.spans
    }
}
