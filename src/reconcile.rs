use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::error::StockError;
use crate::inventory::{Inventory, ReconciledItem, Status, StockItem};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    pub new: usize,
    pub in_stock: usize,
    pub sold: usize,
}

impl StatusCounts {
    pub fn tally(items: &[ReconciledItem]) -> Self {
        items.iter().fold(Self::default(), |mut counts, item| {
            match item.status {
                Status::New => counts.new += 1,
                Status::InStock => counts.in_stock += 1,
                Status::Sold => counts.sold += 1,
            }
            counts
        })
    }
}

fn ensure_unique<'a>(
    titles: impl Iterator<Item = &'a str>,
    inventory: &'static str,
) -> Result<(), StockError> {
    let mut seen = HashSet::new();
    for title in titles {
        if !seen.insert(title) {
            return Err(StockError::AmbiguousTitle {
                title: title.to_string(),
                inventory,
            });
        }
    }
    Ok(())
}

fn within(today: NaiveDate, since: NaiveDate, grace_period_days: i64) -> bool {
    (today - since).num_days() <= grace_period_days
}

/// Merges today's listing into the previous snapshot.
///
/// Titles only in `current` become NEW, titles in both carry their date
/// forward (staying NEW while inside the grace window), and titles missing
/// from `current` become SOLD. SOLD items older than the grace period are
/// dropped from the result.
pub fn reconcile(
    previous: &[ReconciledItem],
    current: &[StockItem],
    today: NaiveDate,
    grace_period_days: i64,
) -> Result<Inventory<ReconciledItem>, StockError> {
    ensure_unique(previous.iter().map(|i| i.title()), "previous")?;
    ensure_unique(current.iter().map(|i| i.title.as_str()), "current")?;

    let old_map: HashMap<_, _> = previous.iter().map(|i| (i.title(), i)).collect();
    let new_titles: HashSet<_> = current.iter().map(|i| i.title.as_str()).collect();

    let listed = current.iter().map(|item| match old_map.get(item.title.as_str()) {
        None => ReconciledItem::new(item.clone(), Status::New, today),
        Some(old)
            if old.status == Status::New && within(today, old.status_date, grace_period_days) =>
        {
            ReconciledItem::new(item.clone(), Status::New, old.status_date)
        }
        Some(old) => ReconciledItem::new(item.clone(), Status::InStock, old.status_date),
    });

    let gone = previous
        .iter()
        .filter(|old| !new_titles.contains(old.title()))
        .map(|old| match old.status {
            Status::Sold => old.clone(),
            _ => ReconciledItem::new(old.item.clone(), Status::Sold, today),
        });

    Ok(listed
        .chain(gone)
        .filter(|item| {
            item.status != Status::Sold || within(today, item.status_date, grace_period_days)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{date, game, in_stock};

    fn find<'a>(items: &'a [ReconciledItem], title: &str) -> Option<&'a ReconciledItem> {
        items.iter().find(|i| i.title() == title)
    }

    #[test]
    fn unseen_title_is_new_today() {
        let today = date("05/01/2024");
        let out = reconcile(&[], &[game("N64", "Game B", 20.0)], today, 1).unwrap();

        assert_eq!(
            out,
            vec![ReconciledItem::new(game("N64", "Game B", 20.0), Status::New, today)]
        );
    }

    #[test]
    fn in_stock_keeps_its_date() {
        let added = date("01/12/2023");
        let previous = vec![ReconciledItem::new(game("PS2", "Okami", 8.0), Status::InStock, added)];
        let current = vec![game("PS2", "Okami", 7.5)];

        let out = reconcile(&previous, &current, date("10/01/2024"), 1).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].status, Status::InStock);
        assert_eq!(out[0].status_date, added);
        assert_eq!(out[0].item.price, 7.5);
    }

    #[test]
    fn new_stays_new_inside_grace_window() {
        let added = date("04/01/2024");
        let previous = vec![ReconciledItem::new(game("N64", "Mario 64", 30.0), Status::New, added)];
        let current = vec![game("N64", "Mario 64", 30.0)];

        let out = reconcile(&previous, &current, date("05/01/2024"), 1).unwrap();
        assert_eq!(out[0].status, Status::New);
        assert_eq!(out[0].status_date, added);

        let out = reconcile(&previous, &current, date("06/01/2024"), 1).unwrap();
        assert_eq!(out[0].status, Status::InStock);
        assert_eq!(out[0].status_date, added);
    }

    #[test]
    fn missing_title_becomes_sold_today() {
        let today = date("05/01/2024");
        let previous = vec![
            ReconciledItem::new(game("GC", "Pikmin", 15.0), Status::InStock, date("01/11/2023")),
            ReconciledItem::new(game("GC", "Metroid", 12.0), Status::New, date("04/01/2024")),
        ];

        let out = reconcile(&previous, &[], today, 1).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|i| i.status == Status::Sold && i.status_date == today));
    }

    #[test]
    fn sold_within_grace_is_unchanged() {
        let previous = vec![ReconciledItem::new(
            game("DC", "Shenmue", 25.0),
            Status::Sold,
            date("09/01/2024"),
        )];

        let out = reconcile(&previous, &[], date("10/01/2024"), 1).unwrap();
        assert_eq!(out, previous);
    }

    #[test]
    fn sold_past_grace_is_dropped() {
        let previous = vec![ReconciledItem::new(
            game("DC", "Game A", 10.0),
            Status::Sold,
            date("01/01/2024"),
        )];

        let out = reconcile(&previous, &[], date("10/01/2024"), 1).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn zero_grace_drops_only_older_sales() {
        let today = date("10/01/2024");
        let previous = vec![
            ReconciledItem::new(game("DC", "Old", 1.0), Status::Sold, date("09/01/2024")),
            ReconciledItem::new(game("DC", "Fresh", 1.0), Status::InStock, date("01/01/2024")),
        ];

        let out = reconcile(&previous, &[], today, 0).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title(), "Fresh");
        assert_eq!(out[0].status_date, today);
    }

    #[test]
    fn restocked_title_returns_in_stock_with_prior_date() {
        let sold_on = date("09/01/2024");
        let previous = vec![ReconciledItem::new(game("PS1", "Vagrant Story", 9.0), Status::Sold, sold_on)];

        let out = reconcile(&previous, &[game("PS1", "Vagrant Story", 9.0)], date("10/01/2024"), 1)
            .unwrap();
        assert_eq!(out[0].status, Status::InStock);
        assert_eq!(out[0].status_date, sold_on);
    }

    #[test]
    fn each_title_appears_once() {
        let today = date("10/01/2024");
        let previous = vec![
            ReconciledItem::new(game("N64", "A", 1.0), Status::InStock, date("01/01/2024")),
            ReconciledItem::new(game("N64", "B", 1.0), Status::New, date("10/01/2024")),
            ReconciledItem::new(game("N64", "C", 1.0), Status::Sold, date("10/01/2024")),
        ];
        let current = vec![game("N64", "A", 1.0), game("N64", "D", 1.0)];

        let out = reconcile(&previous, &current, today, 1).unwrap();
        let mut titles: Vec<_> = out.iter().map(|i| i.title()).collect();
        titles.sort();
        assert_eq!(titles, ["A", "B", "C", "D"]);
        assert_eq!(find(&out, "B").unwrap().status, Status::Sold);
        assert_eq!(find(&out, "D").unwrap().status, Status::New);
    }

    #[test]
    fn reconciling_against_itself_is_stable() {
        let today = date("10/01/2024");
        let previous = vec![
            ReconciledItem::new(game("N64", "A", 1.0), Status::InStock, date("01/01/2024")),
            ReconciledItem::new(game("N64", "B", 1.0), Status::Sold, date("01/01/2024")),
            ReconciledItem::new(game("N64", "C", 1.0), Status::Sold, date("10/01/2024")),
        ];
        let current = vec![game("N64", "A", 1.0), game("N64", "D", 1.0)];
        let once = reconcile(&previous, &current, today, 1).unwrap();

        let twice = reconcile(&once, &in_stock(&once), today, 1).unwrap();
        assert_eq!(once.len(), twice.len());
        for item in &once {
            let again = find(&twice, item.title()).unwrap();
            assert_eq!(again.status, item.status);
            assert_eq!(again.status_date, item.status_date);
        }
    }

    #[test]
    fn duplicate_titles_are_rejected() {
        let today = date("10/01/2024");
        let current = vec![game("N64", "A", 1.0), game("PS1", "A", 2.0)];
        let err = reconcile(&[], &current, today, 1).unwrap_err();
        assert!(matches!(
            err,
            StockError::AmbiguousTitle { ref title, inventory: "current" } if title == "A"
        ));

        let previous = vec![
            ReconciledItem::new(game("N64", "A", 1.0), Status::New, today),
            ReconciledItem::new(game("N64", "A", 1.0), Status::Sold, today),
        ];
        let err = reconcile(&previous, &[], today, 1).unwrap_err();
        assert!(matches!(err, StockError::AmbiguousTitle { inventory: "previous", .. }));
    }

    #[test]
    fn tally_counts_each_status() {
        let today = date("10/01/2024");
        let items = vec![
            ReconciledItem::new(game("N64", "A", 1.0), Status::New, today),
            ReconciledItem::new(game("N64", "B", 1.0), Status::New, today),
            ReconciledItem::new(game("N64", "C", 1.0), Status::Sold, today),
        ];
        assert_eq!(
            StatusCounts::tally(&items),
            StatusCounts {
                new: 2,
                in_stock: 0,
                sold: 1
            }
        );
    }
}
