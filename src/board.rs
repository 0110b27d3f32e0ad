// src/board.rs

use crate::record_db::{OrderStatus, StoredOrder};
use clap::ValueEnum;
use time::{Date, Duration};

/// Delivery-date window for the order board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DateWindow {
    #[default]
    All,
    Today,
    /// Today through seven days out.
    ThisWeek,
    /// Today through the end of the month.
    ThisMonth,
    /// Open orders whose delivery date has passed.
    PastDue,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Empty matches every status.
    pub statuses: Vec<OrderStatus>,
    /// Case-insensitive PO number substring.
    pub search: Option<String>,
    pub window: DateWindow,
}

fn month_end(date: Date) -> Date {
    let (year, month) = match date.month() {
        time::Month::December => (date.year() + 1, time::Month::January),
        m => (date.year(), m.next()),
    };
    Date::from_calendar_date(year, month, 1)
        .ok()
        .and_then(|first| first.previous_day())
        .unwrap_or(date)
}

pub fn is_past_due(order: &StoredOrder, today: Date) -> bool {
    order.delivery_date < today && order.status.is_open()
}

impl OrderFilter {
    pub fn matches(&self, order: &StoredOrder, today: Date) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&order.status) {
            return false;
        }
        if let Some(search) = &self.search {
            if !order
                .po_number
                .to_lowercase()
                .contains(&search.to_lowercase())
            {
                return false;
            }
        }

        let due = order.delivery_date;
        match self.window {
            DateWindow::All => true,
            DateWindow::Today => due == today,
            DateWindow::ThisWeek => due >= today && due <= today + Duration::days(7),
            DateWindow::ThisMonth => due >= today && due <= month_end(today),
            DateWindow::PastDue => is_past_due(order, today),
        }
    }

    pub fn apply<'a>(&self, orders: &'a [StoredOrder], today: Date) -> Vec<&'a StoredOrder> {
        orders.iter().filter(|o| self.matches(o, today)).collect()
    }
}

/// Board heading for one order, e.g. `PAST DUE - PO #1042 - Pending - Due: 2025-03-01`.
pub fn order_header(order: &StoredOrder, today: Date) -> String {
    let status = order.status.as_str().replace('_', " ");
    let mut status_title = String::new();
    for (i, word) in status.split(' ').enumerate() {
        if i > 0 {
            status_title.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            status_title.extend(first.to_uppercase());
            status_title.push_str(chars.as_str());
        }
    }

    let header = format!(
        "PO #{} - {} - Due: {}",
        order.po_number, status_title, order.delivery_date
    );
    if is_past_due(order, today) {
        format!("PAST DUE - {header}")
    } else {
        header
    }
}
