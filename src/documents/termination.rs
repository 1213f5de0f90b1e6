// ABOUTME: Termination letter data, validation, auto-fill, and HTML preview
// ABOUTME: ClientData mirrors the agent form fields submitted as camelCase JSON
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use chrono::NaiveDate;
use html_escape::encode_text;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Kind of request the letter expresses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormType {
    /// Contract termination
    #[default]
    Resiliation,
    /// New subscription
    Souscription,
    /// Contract modification
    Modification,
    /// Anything else
    Autre,
}

impl FormType {
    /// Subject line of the letter
    #[must_use]
    pub const fn subject(self) -> &'static str {
        match self {
            Self::Resiliation => "Résiliation de contrat(s) d'assurance",
            Self::Souscription => "Demande de souscription",
            Self::Modification => "Demande de modification de contrat",
            Self::Autre => "Demande concernant mon contrat d'assurance",
        }
    }

    /// Opening sentence of the letter body
    #[must_use]
    pub const fn opening(self) -> &'static str {
        match self {
            Self::Resiliation => {
                "Par la présente, je vous informe de ma décision de résilier le(s) contrat(s) \
                 d'assurance mentionné(s) ci-dessous pour la prochaine échéance possible."
            }
            Self::Souscription => {
                "Par la présente, je souhaite souscrire aux couvertures d'assurance mentionnées \
                 ci-dessous."
            }
            Self::Modification => {
                "Par la présente, je vous demande de modifier le(s) contrat(s) d'assurance \
                 mentionné(s) ci-dessous."
            }
            Self::Autre => {
                "Par la présente, je vous adresse la demande suivante concernant le(s) contrat(s) \
                 d'assurance mentionné(s) ci-dessous."
            }
        }
    }
}

/// Additional insured person (family member)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonInfo {
    /// Last name
    pub nom: String,
    /// First name
    pub prenom: String,
    /// Birth date as typed (`DD.MM.YYYY`)
    pub date_naissance: String,
    /// Policy number
    pub numero_police: String,
}

impl PersonInfo {
    fn is_blank(&self) -> bool {
        self.nom.trim().is_empty() && self.prenom.trim().is_empty()
    }
}

/// Client data behind the termination letter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientData {
    /// Last name
    pub nom: String,
    /// First name
    pub prenom: String,
    /// Birth date as typed (`DD.MM.YYYY`)
    pub date_naissance: String,
    /// Policy number
    pub numero_police: String,
    /// Email address
    pub email: String,
    /// Street address
    pub adresse: String,
    /// Postal code (NPA)
    pub npa: String,
    /// City
    pub ville: String,
    /// Kind of request
    pub type_formulaire: FormType,
    /// Recipient insurer (name and address block)
    pub destinataire: String,
    /// Place and date line; derived from the city when empty
    pub lieu_date: String,
    /// Additional insured persons
    pub personnes: Vec<PersonInfo>,
    /// Basic insurance (LAMal) termination date
    pub date_lamal: String,
    /// Supplementary insurance (LCA) termination date
    #[serde(rename = "dateLCA", alias = "dateLca")]
    pub date_lca: String,
}

impl ClientData {
    /// `Prénom Nom`
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.prenom.trim(), self.nom.trim())
            .trim()
            .to_owned()
    }

    /// `NPA Ville`
    #[must_use]
    pub fn postal_city(&self) -> String {
        format!("{} {}", self.npa.trim(), self.ville.trim())
            .trim()
            .to_owned()
    }

    /// Names of required fields that are blank, in form order
    #[must_use]
    pub fn validate(&self) -> Vec<&'static str> {
        let required: [(&'static str, &str); 8] = [
            ("nom", &self.nom),
            ("prenom", &self.prenom),
            ("dateNaissance", &self.date_naissance),
            ("numeroPolice", &self.numero_police),
            ("email", &self.email),
            ("adresse", &self.adresse),
            ("npa", &self.npa),
            ("ville", &self.ville),
        ];

        let mut missing: Vec<&'static str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !self.email.trim().is_empty() && !self.email.contains('@') {
            missing.push("email");
        }
        missing.dedup();
        missing
    }

    /// Plain-text letter filled with this client's data
    #[must_use]
    pub fn fill_termination_letter(&self, today: NaiveDate) -> String {
        let mut letter = String::new();
        let full_name = self.full_name();

        let _ = writeln!(letter, "{full_name}");
        let _ = writeln!(letter, "{}", self.adresse.trim());
        let _ = writeln!(letter, "{}", self.postal_city());
        letter.push('\n');

        if !self.destinataire.trim().is_empty() {
            for line in self.destinataire.trim().lines() {
                let _ = writeln!(letter, "{}", line.trim());
            }
            letter.push('\n');
        }

        let place_date = if self.lieu_date.trim().is_empty() {
            format!("{}, le {}", self.ville.trim(), today.format("%d.%m.%Y"))
        } else {
            self.lieu_date.trim().to_owned()
        };
        let _ = writeln!(letter, "{place_date}");
        letter.push('\n');

        let _ = writeln!(letter, "Objet : {}", self.type_formulaire.subject());
        let _ = writeln!(letter, "Numéro de police : {}", self.numero_police.trim());
        letter.push('\n');

        letter.push_str("Madame, Monsieur,\n\n");
        let _ = writeln!(letter, "{}", self.type_formulaire.opening());
        letter.push('\n');

        if !self.date_lamal.trim().is_empty() {
            let _ = writeln!(
                letter,
                "Assurance obligatoire des soins (LAMal) : au {}",
                self.date_lamal.trim()
            );
        }
        if !self.date_lca.trim().is_empty() {
            let _ = writeln!(
                letter,
                "Assurances complémentaires (LCA) : au {}",
                self.date_lca.trim()
            );
        }
        if !self.date_lamal.trim().is_empty() || !self.date_lca.trim().is_empty() {
            letter.push('\n');
        }

        letter.push_str("Personnes concernées :\n");
        let _ = writeln!(
            letter,
            "- {full_name}, né(e) le {}, police n° {}",
            self.date_naissance.trim(),
            self.numero_police.trim()
        );
        for person in self.personnes.iter().filter(|p| !p.is_blank()) {
            let policy = if person.numero_police.trim().is_empty() {
                self.numero_police.trim()
            } else {
                person.numero_police.trim()
            };
            let _ = writeln!(
                letter,
                "- {} {}, né(e) le {}, police n° {policy}",
                person.prenom.trim(),
                person.nom.trim(),
                person.date_naissance.trim(),
            );
        }
        letter.push('\n');

        letter.push_str(
            "Je vous prie de bien vouloir me faire parvenir une confirmation écrite \
             de la prise en compte de cette demande.\n\n",
        );
        letter.push_str("Veuillez agréer, Madame, Monsieur, mes salutations distinguées.\n\n");
        let _ = writeln!(letter, "{full_name}");
        letter
    }
}

/// HTML preview of a plain-text letter; blank lines separate paragraphs
#[must_use]
pub fn render_html(letter: &str) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html lang=\"fr\">\n<head><meta charset=\"utf-8\"><title>Lettre</title></head>\n\
         <body style=\"font-family: Arial, sans-serif; font-size: 12pt; max-width: 720px; margin: 40px auto;\">\n",
    );

    for paragraph in letter.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let lines: Vec<String> = paragraph
            .lines()
            .map(|line| encode_text(line.trim()).into_owned())
            .collect();
        let _ = writeln!(html, "<p>{}</p>", lines.join("<br>"));
    }

    html.push_str("</body>\n</html>\n");
    html
}
