//! Reverse-chronological scanning of a page type's record history, and
//! merging several such streams into one.

use crate::record::Record;

/// Three-way result from a scan callback, so "stop early" is never
/// confused with "an error occurred".
pub enum Flow {
    Continue,
    Stop,
}

/// Visits every record of `page_type` from `last_page` down to
/// `first_page`, newest page first and newest record within a page first,
/// calling `fetch` to materialize each page's records and `visit` per
/// record. `visit` returning [`Flow::Stop`] ends the scan without error;
/// an `Err` from either closure ends it and propagates.
///
/// Generic over the error type so callers that fold failures into a
/// sticky session slot (rather than threading [`crate::error::Error`]
/// through every closure) can instantiate `E = ()`.
pub fn iter_records<E>(
    first_page: i32,
    last_page: i32,
    mut fetch: impl FnMut(i32) -> Result<Vec<Record>, E>,
    mut visit: impl FnMut(&Record) -> Result<Flow, E>,
) -> Result<(), E> {
    let mut page = last_page;
    while page >= first_page {
        let records = fetch(page)?;
        for record in &records {
            match visit(record)? {
                Flow::Continue => {}
                Flow::Stop => return Ok(()),
            }
        }
        page -= 1;
    }
    Ok(())
}

/// Collects records newer than `since` (strictly: `display_time > since`),
/// in reverse-chronological order. `since == 0` means "everything".
pub fn read_history<E>(
    first_page: i32,
    last_page: i32,
    since: i64,
    fetch: impl FnMut(i32) -> Result<Vec<Record>, E>,
) -> Result<Vec<Record>, E> {
    let mut out = Vec::new();
    iter_records(first_page, last_page, fetch, |r| {
        if r.timestamp().display_time > since {
            out.push(r.clone());
            Ok(Flow::Continue)
        } else {
            Ok(Flow::Stop)
        }
    })?;
    Ok(out)
}

/// Collects the `n` most recent records (or all of them, if fewer than
/// `n` exist), in reverse-chronological order.
pub fn read_count<E>(
    first_page: i32,
    last_page: i32,
    n: usize,
    fetch: impl FnMut(i32) -> Result<Vec<Record>, E>,
) -> Result<Vec<Record>, E> {
    let mut out = Vec::with_capacity(n);
    iter_records(first_page, last_page, fetch, |r| {
        out.push(r.clone());
        if out.len() >= n {
            Ok(Flow::Stop)
        } else {
            Ok(Flow::Continue)
        }
    })?;
    Ok(out)
}

/// Merges `k` reverse-chronological streams into a single
/// reverse-chronological stream. At each output slot the candidate with
/// the latest `display_time` is chosen; equal times are broken in favor
/// of the earliest stream in `streams`.
pub fn merge_history(streams: &[Vec<Record>]) -> Vec<Record> {
    let mut cursor = vec![0usize; streams.len()];
    let total: usize = streams.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(total);

    loop {
        let mut best: Option<usize> = None;
        for (i, stream) in streams.iter().enumerate() {
            if cursor[i] >= stream.len() {
                continue;
            }
            let t = stream[cursor[i]].timestamp().display_time;
            let take = match best {
                None => true,
                Some(b) => t > streams[b][cursor[b]].timestamp().display_time,
            };
            if take {
                best = Some(i);
            }
        }
        match best {
            None => break,
            Some(i) => {
                out.push(streams[i][cursor[i]].clone());
                cursor[i] += 1;
            }
        }
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::time::Timestamp;

    fn egv(display_time: i64) -> Record {
        Record::EgvInfo {
            timestamp: Timestamp {
                system_time: display_time,
                display_time,
            },
            glucose: 100,
            display_only: false,
            noise: 0,
            trend: crate::record::Trend::Flat,
        }
    }

    #[test]
    fn iter_records_scans_pages_newest_first() {
        let mut seen = Vec::new();
        iter_records(
            1,
            3,
            |page| Ok::<_, crate::error::Error>(vec![egv(page as i64 * 10)]),
            |r| {
                seen.push(r.timestamp().display_time);
                Ok(Flow::Continue)
            },
        )
        .unwrap();
        assert_eq!(seen, vec![30, 20, 10]);
    }

    #[test]
    fn read_history_stops_strictly_after_cutoff() {
        let records = vec![egv(50), egv(40), egv(30), egv(20)];
        let records_clone = records.clone();
        let result =
            read_history(1, 1, 30, move |_| Ok::<_, crate::error::Error>(records_clone.clone()))
                .unwrap();
        let times: Vec<_> = result.iter().map(|r| r.timestamp().display_time).collect();
        assert_eq!(times, vec![50, 40]);
        let _ = records;
    }

    #[test]
    fn read_count_caps_at_n() {
        let records = vec![egv(50), egv(40), egv(30)];
        let result =
            read_count(1, 1, 2, move |_| Ok::<_, crate::error::Error>(records.clone())).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn merge_is_stable_descending() {
        let a = vec![egv(50), egv(30), egv(10)];
        let b = vec![egv(40), egv(20)];
        let merged = merge_history(&[a, b]);
        let times: Vec<_> = merged.iter().map(|r| r.timestamp().display_time).collect();
        assert_eq!(times, vec![50, 40, 30, 20, 10]);
        assert_eq!(merged.len(), 5);
    }

    #[test]
    fn merge_ties_favor_earlier_stream() {
        let a = vec![egv(10)];
        let b = vec![egv(10)];
        let merged = merge_history(&[a.clone(), b]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], a[0]);
    }
}
