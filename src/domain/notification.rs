use super::event::EventConfig;
use super::registration::PendingRegistration;

/// A transactional email addressed to one registrant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html: String,
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn addressed(pending: &PendingRegistration, subject: String, html: String) -> Email {
    Email {
        to: pending.email.clone(),
        to_name: Some(pending.name.clone()),
        subject,
        html,
    }
}

pub fn registration_initiated(event: &EventConfig, pending: &PendingRegistration) -> Email {
    let html = format!(
        "<h1>Registration Initiated!</h1>\
         <p>Dear {name},</p>\
         <p>Your registration for the {title} is being processed.</p>\
         <p>Ticket number: <strong>{ticket}</strong></p>\
         <p>Please complete the payment to confirm your registration.</p>\
         <p>This ticket will be activated after successful payment.</p>",
        name = escape_html(&pending.name),
        title = escape_html(&event.title),
        ticket = escape_html(&pending.ticket_number),
    );
    addressed(pending, format!("Registration Initiated - {}", event.title), html)
}

pub fn registration_confirmed(
    event: &EventConfig,
    pending: &PendingRegistration,
    transaction_id: &str,
) -> Email {
    let html = format!(
        "<h1>Registration Confirmed!</h1>\
         <p>Dear {name},</p>\
         <p>Your registration for the {title} has been confirmed!</p>\
         <p>Details:</p>\
         <ul>\
         <li>Ticket Number: <strong>{ticket}</strong></li>\
         <li>Package: {package}</li>\
         <li>Order ID: {order}</li>\
         <li>Transaction ID: {transaction}</li>\
         </ul>\
         <p>Keep this ticket number safe for entry.</p>",
        name = escape_html(&pending.name),
        title = escape_html(&event.title),
        ticket = escape_html(&pending.ticket_number),
        package = escape_html(&pending.package),
        order = escape_html(&pending.order_id),
        transaction = escape_html(transaction_id),
    );
    addressed(pending, format!("Registration Confirmed - {}", event.title), html)
}

pub fn registration_failed(
    event: &EventConfig,
    pending: &PendingRegistration,
    reason_code: &str,
) -> Email {
    let html = format!(
        "<h1>Registration Failed</h1>\
         <p>Dear {name},</p>\
         <p>Your payment for the {title} was unsuccessful ({reason}).</p>\
         <p>Order ID: {order}</p>\
         <p>Please try again or contact support.</p>",
        name = escape_html(&pending.name),
        title = escape_html(&event.title),
        reason = escape_html(reason_code),
        order = escape_html(&pending.order_id),
    );
    addressed(pending, format!("Registration Failed - {}", event.title), html)
}
