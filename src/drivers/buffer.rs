use std::collections::VecDeque;

/// Vertical trigger line drawn over the scrolling plot.
///
/// `position` is the buffer index of the first sample recorded after the trigger;
/// `id` is stable for the marker's lifetime so a renderer can match its line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerMarker {
    pub id: u64,
    pub position: usize,
}

/// Fixed-capacity series with trigger markers that scroll together with the samples.
#[derive(Clone, Debug)]
pub struct RollingBuffer<T> {
    values: VecDeque<T>,
    markers: VecDeque<TriggerMarker>,
    capacity: usize,
    next_marker_id: u64,
}

impl<T> RollingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity + 1),
            markers: VecDeque::new(),
            capacity,
            next_marker_id: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    /// Most recently appended value.
    pub fn latest(&self) -> Option<&T> {
        self.values.back()
    }

    pub fn markers(&self) -> impl Iterator<Item = &TriggerMarker> {
        self.markers.iter()
    }

    /// Append a value, evicting the oldest ones past capacity.
    ///
    /// Each eviction shifts every marker one position left. Markers that reach
    /// position 0 have scrolled off and are returned, oldest first, so the caller
    /// can drop their rendered lines.
    pub fn append(&mut self, value: T) -> Vec<TriggerMarker> {
        self.values.push_back(value);
        let mut expired = Vec::new();
        while self.values.len() > self.capacity {
            self.values.pop_front();
            for marker in self.markers.iter_mut() {
                marker.position = marker.position.saturating_sub(1);
            }
            // positions are non-decreasing, so scrolled-off markers sit at the front
            while self.markers.front().is_some_and(|m| m.position == 0) {
                if let Some(marker) = self.markers.pop_front() {
                    expired.push(marker);
                }
            }
        }
        expired
    }

    /// Record a trigger at the current series length.
    pub fn mark_trigger(&mut self) -> TriggerMarker {
        let marker = TriggerMarker {
            id: self.next_marker_id,
            position: self.values.len(),
        };
        self.next_marker_id += 1;
        self.markers.push_back(marker);
        marker
    }

    /// Drop all values and markers, returning the markers that were live.
    pub fn clear(&mut self) -> Vec<TriggerMarker> {
        self.values.clear();
        self.markers.drain(..).collect()
    }
}

impl RollingBuffer<f64> {
    /// `[index, value]` pairs ready for a line plot.
    pub fn plot_points(&self) -> Vec<[f64; 2]> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| [i as f64, *v])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_the_last_capacity_values_in_order() {
        let mut buffer = RollingBuffer::new(100);
        for i in 0..150 {
            buffer.append(i);
        }
        assert_eq!(buffer.len(), 100);
        let kept: Vec<i32> = buffer.values().copied().collect();
        assert_eq!(kept, (50..150).collect::<Vec<_>>());
        assert_eq!(buffer.latest(), Some(&149));
        buffer.clear();
        assert_eq!(buffer.latest(), None);
    }

    #[test]
    fn markers_hold_position_without_overflow() {
        let mut buffer = RollingBuffer::new(100);
        for i in 0..50 {
            buffer.append(i as f64);
        }
        let marker = buffer.mark_trigger();
        assert_eq!(marker.position, 50);
        for i in 0..50 {
            assert!(buffer.append(i as f64).is_empty());
        }
        assert_eq!(buffer.len(), 100);
        assert_eq!(buffer.markers().next().unwrap().position, 50);
    }

    #[test]
    fn markers_scroll_off_and_are_reported_once() {
        let mut buffer = RollingBuffer::new(100);
        for i in 0..50 {
            buffer.append(i as f64);
        }
        let marker = buffer.mark_trigger();
        let mut reported = Vec::new();
        // 50 appends fill the buffer, 60 more cause 60 evictions
        for i in 0..110 {
            reported.extend(buffer.append(i as f64));
            if i == 59 {
                assert_eq!(buffer.markers().next().unwrap().position, 40);
            }
        }
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].id, marker.id);
        assert_eq!(buffer.markers().count(), 0);
    }

    #[test]
    fn duplicate_markers_age_independently() {
        let mut buffer = RollingBuffer::new(3);
        buffer.append(1.0);
        let a = buffer.mark_trigger();
        let b = buffer.mark_trigger();
        assert_eq!(a.position, b.position);
        assert_ne!(a.id, b.id);
        buffer.append(2.0);
        buffer.append(3.0);
        assert_eq!(buffer.markers().count(), 2);
        let expired = buffer.append(4.0);
        assert_eq!(expired.iter().map(|m| m.id).collect::<Vec<_>>(), vec![a.id, b.id]);
    }

    #[test]
    fn clear_returns_live_markers() {
        let mut buffer = RollingBuffer::new(10);
        buffer.append(1.0);
        buffer.mark_trigger();
        let dropped = buffer.clear();
        assert_eq!(dropped.len(), 1);
        assert!(buffer.is_empty());
        assert_eq!(buffer.mark_trigger().position, 0);
    }

    #[test]
    fn plot_points_are_indexed() {
        let mut buffer = RollingBuffer::new(2);
        buffer.append(1.0);
        buffer.append(2.0);
        buffer.append(3.0);
        assert_eq!(buffer.plot_points(), vec![[0.0, 2.0], [1.0, 3.0]]);
    }
}
