use tally_core::Aggregate;

/// Execute an aggregate command deterministically (no IO, no async).
///
/// 1. **Decide**: `aggregate.handle(command)` produces events without mutating.
/// 2. **Evolve**: each event is applied via `aggregate.apply(event)`.
///
/// A rejected command returns the error and leaves the aggregate untouched.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: Aggregate,
{
    execute_settled(aggregate, command, |_| Ok(()))
}

/// Execute a command whose outcome depends on an external side effect.
///
/// `settle` runs between decide and evolve with the decided events. It is the
/// place for could-fail interactions with collaborators (e.g. moving money). If
/// it fails, no event is applied and the error is returned, so the decision and
/// the side effect commit or abort as one unit.
pub fn execute_settled<A, F>(
    aggregate: &mut A,
    command: &A::Command,
    settle: F,
) -> Result<Vec<A::Event>, A::Error>
where
    A: Aggregate,
    F: FnOnce(&[A::Event]) -> Result<(), A::Error>,
{
    let events = A::handle(aggregate, command)?;
    settle(&events)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{AggregateId, AggregateRoot};

    #[derive(Debug)]
    struct Counter {
        id: AggregateId,
        value: u64,
        version: u64,
    }

    #[derive(Debug, Clone)]
    struct Add(u64);

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Added(u64);

    impl AggregateRoot for Counter {
        type Id = AggregateId;

        fn id(&self) -> &Self::Id {
            &self.id
        }

        fn version(&self) -> u64 {
            self.version
        }
    }

    impl Aggregate for Counter {
        type Command = Add;
        type Event = Added;
        type Error = String;

        fn apply(&mut self, event: &Self::Event) {
            self.value += event.0;
            self.version += 1;
        }

        fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
            if command.0 == 0 {
                return Err("zero".to_string());
            }
            Ok(vec![Added(command.0)])
        }
    }

    fn counter() -> Counter {
        Counter {
            id: AggregateId::new(),
            value: 0,
            version: 0,
        }
    }

    #[test]
    fn execute_applies_decided_events() {
        let mut c = counter();
        let events = execute(&mut c, &Add(3)).unwrap();
        assert_eq!(events, vec![Added(3)]);
        assert_eq!(c.value, 3);
        assert_eq!(c.version(), 1);
    }

    #[test]
    fn rejected_command_leaves_aggregate_untouched() {
        let mut c = counter();
        assert!(execute(&mut c, &Add(0)).is_err());
        assert_eq!(c.value, 0);
        assert_eq!(c.version(), 0);
    }

    #[test]
    fn failed_settlement_discards_events() {
        let mut c = counter();
        let err = execute_settled(&mut c, &Add(5), |_| Err("declined".to_string())).unwrap_err();
        assert_eq!(err, "declined");
        assert_eq!(c.value, 0);
        assert_eq!(c.version(), 0);
    }

    #[test]
    fn settlement_sees_the_decided_events() {
        let mut c = counter();
        let mut seen = Vec::new();
        execute_settled(&mut c, &Add(2), |events| {
            seen.extend_from_slice(events);
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![Added(2)]);
        assert_eq!(c.value, 2);
    }
}
