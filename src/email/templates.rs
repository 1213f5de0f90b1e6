// ABOUTME: French email templates for invitations, signature notifications, and confirmations
// ABOUTME: Every interpolated value is HTML-escaped before landing in the markup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use chrono::{DateTime, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Serialize;

/// Rendered subject and bodies
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailTemplate {
    /// Subject line
    pub subject: String,
    /// HTML body
    pub html: String,
    /// Plain-text body
    pub text: String,
}

/// Values for the client invitation
#[derive(Debug, Clone)]
pub struct InvitationContext<'a> {
    /// Client display name
    pub client_name: &'a str,
    /// Agent display name, if the case has an agent
    pub agent_name: Option<&'a str>,
    /// Case number (`RES-YYYY-NNN`)
    pub case_number: &'a str,
    /// Portal link carrying the secure token
    pub portal_link: &'a str,
    /// When the portal link stops working
    pub expires_at: DateTime<Utc>,
}

/// Values for the signature notification sent to the agent and the office
#[derive(Debug, Clone)]
pub struct SignatureContext<'a> {
    /// Recipient display name
    pub recipient_name: &'a str,
    /// Client display name
    pub client_name: &'a str,
    /// Client email
    pub client_email: &'a str,
    /// Case number
    pub case_number: &'a str,
    /// Signature timestamp
    pub signed_at: DateTime<Utc>,
}

/// Values for the completion confirmation sent to the client
#[derive(Debug, Clone)]
pub struct CompletionContext<'a> {
    /// Client display name
    pub client_name: &'a str,
    /// Case number
    pub case_number: &'a str,
    /// Link to download the signed document
    pub download_link: &'a str,
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="fr">
<head><meta charset="utf-8"><title>{title}</title></head>
<body style="font-family: Arial, sans-serif; color: #1f2937; max-width: 600px; margin: 0 auto;">
<div style="background: #1e3a8a; color: #ffffff; padding: 20px;"><h1 style="margin: 0; font-size: 20px;">eSignPro</h1></div>
<div style="padding: 24px;">
{body}
</div>
<div style="padding: 16px; font-size: 12px; color: #6b7280;">Ce message a été envoyé automatiquement, merci de ne pas y répondre directement.</div>
</body>
</html>"#,
        title = encode_text(title),
    )
}

fn button(href: &str, label: &str) -> String {
    format!(
        r#"<p style="text-align: center; margin: 32px 0;"><a href="{}" style="background: #2563eb; color: #ffffff; padding: 12px 24px; border-radius: 6px; text-decoration: none;">{}</a></p>"#,
        encode_double_quoted_attribute(href),
        encode_text(label),
    )
}

/// Invitation carrying the portal link
#[must_use]
pub fn client_invitation(ctx: &InvitationContext<'_>) -> EmailTemplate {
    let subject = format!("Résiliation de contrat - Dossier {}", ctx.case_number);
    let expires = ctx.expires_at.format("%d.%m.%Y").to_string();
    let agent_line = ctx.agent_name.map_or_else(String::new, |agent| {
        format!(
            "<p>Votre conseiller, {}, a préparé votre dossier.</p>",
            encode_text(agent)
        )
    });

    let body = format!(
        "<p>Bonjour {client},</p>\
         {agent_line}\
         <p>Pour finaliser la résiliation de votre contrat (dossier <strong>{case}</strong>), \
         merci de transmettre vos pièces d'identité puis de signer le document électronique.</p>\
         {button}\
         <p>Ce lien est personnel et reste valable jusqu'au {expires}.</p>",
        client = encode_text(ctx.client_name),
        case = encode_text(ctx.case_number),
        button = button(ctx.portal_link, "Accéder à mon dossier"),
    );

    let agent_text = ctx
        .agent_name
        .map_or_else(String::new, |agent| format!("Votre conseiller, {agent}, a préparé votre dossier.\n\n"));
    let text = format!(
        "Bonjour {},\n\n{agent_text}Pour finaliser la résiliation de votre contrat (dossier {}), \
         merci de transmettre vos pièces d'identité puis de signer le document électronique.\n\n\
         Accéder à mon dossier : {}\n\nCe lien est personnel et reste valable jusqu'au {expires}.\n",
        ctx.client_name, ctx.case_number, ctx.portal_link,
    );

    EmailTemplate {
        html: layout(&subject, &body),
        subject,
        text,
    }
}

/// Notification that the client signed
#[must_use]
pub fn signature_notification(ctx: &SignatureContext<'_>) -> EmailTemplate {
    let subject = format!("Document signé - Dossier {}", ctx.case_number);
    let signed_at = ctx.signed_at.format("%d.%m.%Y %H:%M UTC").to_string();

    let body = format!(
        "<p>Bonjour {recipient},</p>\
         <p>Le client <strong>{client}</strong> ({email}) a signé le document du dossier \
         <strong>{case}</strong> le {signed_at}.</p>\
         <p>Le dossier peut maintenant être finalisé et exporté.</p>",
        recipient = encode_text(ctx.recipient_name),
        client = encode_text(ctx.client_name),
        email = encode_text(ctx.client_email),
        case = encode_text(ctx.case_number),
    );

    let text = format!(
        "Bonjour {},\n\nLe client {} ({}) a signé le document du dossier {} le {signed_at}.\n\n\
         Le dossier peut maintenant être finalisé et exporté.\n",
        ctx.recipient_name, ctx.client_name, ctx.client_email, ctx.case_number,
    );

    EmailTemplate {
        html: layout(&subject, &body),
        subject,
        text,
    }
}

/// Confirmation sent to the client once the case is completed
#[must_use]
pub fn completion_confirmation(ctx: &CompletionContext<'_>) -> EmailTemplate {
    let subject = format!("Confirmation de signature - Dossier {}", ctx.case_number);

    let body = format!(
        "<p>Bonjour {client},</p>\
         <p>Votre demande de résiliation (dossier <strong>{case}</strong>) est complète. \
         Nous la transmettons à votre assureur.</p>\
         {button}\
         <p>Conservez ce document pour vos dossiers.</p>",
        client = encode_text(ctx.client_name),
        case = encode_text(ctx.case_number),
        button = button(ctx.download_link, "Télécharger le document signé"),
    );

    let text = format!(
        "Bonjour {},\n\nVotre demande de résiliation (dossier {}) est complète. \
         Nous la transmettons à votre assureur.\n\nTélécharger le document signé : {}\n",
        ctx.client_name, ctx.case_number, ctx.download_link,
    );

    EmailTemplate {
        html: layout(&subject, &body),
        subject,
        text,
    }
}
