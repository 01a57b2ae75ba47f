use chrono::{DateTime, Utc};
use finsight_core::domain::notification::{relative_label, NotificationFilter, NotificationType};
use finsight_core::notify::NotificationView;
use finsight_core::projection::Projection;
use std::fmt::Write;

pub fn projection_table(p: &Projection) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:>6}  {:>5}  {:>14}", "month", "year", "balance");
    for point in &p.series {
        let _ = writeln!(
            out,
            "{:>6}  {:>5}  {:>14}",
            point.month_index,
            point.year_label,
            money(point.balance)
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Total contributed: {}", money(p.summary.total_contributed));
    let _ = writeln!(out, "Interest earned:   {}", money(p.summary.interest_earned));
    let _ = writeln!(out, "Final balance:     {}", money(p.summary.final_balance));
    out
}

pub fn notification_list(
    view: &NotificationView,
    filter: NotificationFilter,
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let mut shown = 0usize;
    for n in view.filtered(filter) {
        shown += 1;
        let marker = if n.read { ' ' } else { '*' };
        let _ = writeln!(
            out,
            "{marker} [{}] {:<8} {}  ({})",
            n.id,
            kind_label(n.kind),
            n.title,
            relative_label(n.timestamp, now)
        );
        let _ = writeln!(out, "    {}", n.message);
    }
    if shown == 0 {
        let _ = writeln!(
            out,
            "{}",
            match filter {
                NotificationFilter::All => "No notifications.",
                NotificationFilter::Unread => "No unread notifications.",
            }
        );
    }
    let _ = writeln!(out, "{} unread", view.unread_count());
    out
}

fn kind_label(kind: NotificationType) -> &'static str {
    match kind {
        NotificationType::Alert => "alert",
        NotificationType::Success => "success",
        NotificationType::Info => "info",
        NotificationType::Warning => "warning",
        NotificationType::Failure => "failure",
        NotificationType::Reminder => "reminder",
    }
}

/// Whole currency units with thousands separators, e.g. `-1,234`.
fn money(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}
