use std::cmp::Reverse;

use crate::models::{Client, Request, TaggedRequest};

/// Combine per-client windows into one feed, newest first, keeping at most
/// `limit` entries.
///
/// Inputs need not be sorted. Requests with the same start time are ordered
/// by their position in their own window, then by the client's position in
/// `windows`, so identical inputs always merge identically.
pub(crate) fn merge_recent(windows: &[(&Client, &[Request])], limit: usize) -> Vec<TaggedRequest> {
    let mut keyed: Vec<(usize, usize, &Client, &Request)> = windows
        .iter()
        .enumerate()
        .flat_map(|(client_idx, (client, requests))| {
            requests
                .iter()
                .enumerate()
                .map(move |(arrival_idx, r)| (client_idx, arrival_idx, *client, r))
        })
        .collect();

    keyed.sort_by_key(|(client_idx, arrival_idx, _, r)| {
        (Reverse(r.start_time), *arrival_idx, *client_idx)
    });

    keyed
        .into_iter()
        .take(limit)
        .map(|(_, _, client, r)| TaggedRequest {
            client_id: client.id.clone(),
            client_name: client.name.clone(),
            request: r.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClientStatus;
    use crate::testing::{client, request};

    fn window(prefix: &str, count: usize, offset: i64) -> Vec<Request> {
        (0..count)
            .map(|i| request(&format!("{}{}", prefix, i), offset + i as i64 * 7, 10))
            .collect()
    }

    #[test]
    fn output_is_newest_first_and_bounded() {
        let a = client("a", ClientStatus::Online);
        let b = client("b", ClientStatus::Online);
        let wa = window("a", 4, 3);
        let wb = window("b", 3, 0);

        let merged = merge_recent(&[(&a, wa.as_slice()), (&b, wb.as_slice())], 10);
        assert_eq!(merged.len(), 7);
        assert!(
            merged
                .windows(2)
                .all(|p| p[0].request.start_time >= p[1].request.start_time)
        );

        let merged = merge_recent(&[(&a, wa.as_slice()), (&b, wb.as_slice())], 5);
        assert_eq!(merged.len(), 5);
    }

    #[test]
    fn empty_failed_window_contributes_nothing() {
        let a = client("a", ClientStatus::Online);
        let dead = client("dead", ClientStatus::Online);
        let c = client("c", ClientStatus::Online);
        let wa = window("a", 5, 0);
        let wc = window("c", 8, 1);
        let none: Vec<Request> = Vec::new();

        let merged = merge_recent(&[(&a, wa.as_slice()), (&dead, none.as_slice()), (&c, wc.as_slice())], 10);
        assert_eq!(merged.len(), 10);
        assert!(merged.iter().all(|t| t.client_id != "dead"));
        assert_eq!(merged[0].client_id, "c");
        assert_eq!(merged[0].client_name, "c-name");
    }

    #[test]
    fn ties_follow_arrival_then_client_order() {
        let a = client("a", ClientStatus::Online);
        let b = client("b", ClientStatus::Online);
        let wa = vec![request("a0", 0, 1), request("a1", 50, 1), request("a2", 50, 1)];
        let wb = vec![request("b0", 50, 1), request("b1", 50, 1)];

        let merged = merge_recent(&[(&a, wa.as_slice()), (&b, wb.as_slice())], 10);
        let ids: Vec<&str> = merged.iter().map(|t| t.request.id.as_str()).collect();
        assert_eq!(ids, vec!["b0", "a1", "b1", "a2", "a0"]);

        let again = merge_recent(&[(&a, wa.as_slice()), (&b, wb.as_slice())], 10);
        assert_eq!(merged, again);
    }

    #[test]
    fn unsorted_windows_are_handled() {
        let a = client("a", ClientStatus::Online);
        let wa = vec![request("old", 1, 1), request("new", 90, 1), request("mid", 40, 1)];
        let merged = merge_recent(&[(&a, wa.as_slice())], 2);
        let ids: Vec<&str> = merged.iter().map(|t| t.request.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }
}
