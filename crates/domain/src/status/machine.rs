use workload_core::StatusCode;

/// 两次观测之间允许的状态变化
///
/// - 没有任何状态可以回到 `Created`
/// - 终态只能保持不变，或因后端丢失/不可达变为 `Unknown`、`NotFoundInCluster`
/// - `Running` 不会退回 `Unschedulable`
pub fn can_transition(from: StatusCode, to: StatusCode) -> bool {
    use StatusCode::*;

    if to == Created {
        return from == Created;
    }
    if from == to {
        return true;
    }
    match from {
        Created | Unknown | NotFoundInCluster => true,
        Unschedulable => true,
        Running => to != Unschedulable,
        StoppedOnOk | StoppedOnFailed | StoppedByKilled => {
            matches!(to, Unknown | NotFoundInCluster)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StatusCode::*;

    #[test]
    fn test_nothing_returns_to_created() {
        for from in StatusCode::ALL {
            if from != Created {
                assert!(!can_transition(from, Created), "{from} -> Created");
            }
        }
    }

    #[test]
    fn test_terminal_states_stay_terminal() {
        for from in [StoppedOnOk, StoppedOnFailed, StoppedByKilled] {
            assert!(can_transition(from, from));
            assert!(can_transition(from, NotFoundInCluster));
            assert!(!can_transition(from, Running));
            assert!(!can_transition(from, Unschedulable));
        }
        assert!(!can_transition(StoppedOnOk, StoppedOnFailed));
    }

    #[test]
    fn test_normal_lifecycle() {
        let path = [Created, Unschedulable, Running, StoppedOnOk];
        for pair in path.windows(2) {
            assert!(can_transition(pair[0], pair[1]));
        }
        assert!(!can_transition(Running, Unschedulable));
        assert!(can_transition(Unknown, Running));
    }
}
