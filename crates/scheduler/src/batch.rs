use crate::object::TimedObject;
use crate::SchedulerError;

/// Contiguous, order-preserving group of objects revealed together.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    index: usize,
    objects: Vec<TimedObject>,
}

impl Batch {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn objects(&self) -> &[TimedObject] {
        &self.objects
    }

    pub(crate) fn objects_mut(&mut self) -> &mut [TimedObject] {
        &mut self.objects
    }

    /// First object of the batch. Batches are never empty.
    pub fn first(&self) -> &TimedObject {
        &self.objects[0]
    }

    pub fn get(&self, offset: usize) -> Option<&TimedObject> {
        self.objects.get(offset)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn into_objects(self) -> Vec<TimedObject> {
        self.objects
    }
}

/// Splits `objects` into `ceil(len / batch_size)` batches; only the last may be short.
pub fn batch(objects: Vec<TimedObject>, batch_size: usize) -> Result<Vec<Batch>, SchedulerError> {
    if batch_size == 0 {
        return Err(SchedulerError::InvalidConfig(
            "batch size must be greater than zero".into(),
        ));
    }
    if objects.is_empty() {
        return Err(SchedulerError::EmptyInput);
    }

    let mut batches = Vec::with_capacity(objects.len().div_ceil(batch_size));
    let mut remaining = objects.into_iter().peekable();
    while remaining.peek().is_some() {
        let chunk: Vec<TimedObject> = remaining.by_ref().take(batch_size).collect();
        batches.push(Batch {
            index: batches.len(),
            objects: chunk,
        });
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectKind;

    fn circles(count: usize) -> Vec<TimedObject> {
        (0..count)
            .map(|i| TimedObject::new(ObjectKind::Circle, i as f64 * 100.0, 450.0))
            .collect()
    }

    #[test]
    fn sizes_and_order_hold_for_many_shapes() {
        for count in 1..40 {
            for size in 1..12 {
                let source = circles(count);
                let batches = batch(source.clone(), size).unwrap();
                assert_eq!(batches.len(), count.div_ceil(size), "n={count} b={size}");
                let (last, full) = batches.split_last().unwrap();
                assert!(full.iter().all(|b| b.len() == size));
                assert!(last.len() >= 1 && last.len() <= size);
                for (expected, batch) in batches.iter().enumerate() {
                    assert_eq!(batch.index(), expected);
                }
                let flattened: Vec<TimedObject> =
                    batches.into_iter().flat_map(Batch::into_objects).collect();
                assert_eq!(flattened, source);
            }
        }
    }

    #[test]
    fn exact_multiple_has_no_short_batch() {
        let batches = batch(circles(100), 50).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].first().start_time, 5000.0);
        assert_eq!(batches[1].len(), 50);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            batch(Vec::new(), 4),
            Err(SchedulerError::EmptyInput)
        ));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(matches!(
            batch(circles(3), 0),
            Err(SchedulerError::InvalidConfig(_))
        ));
    }
}
