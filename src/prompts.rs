use serde::{Deserialize, Serialize};
use std::fmt;

/// The four features served by the companion. Each differs from the others
/// only in its fixed instruction and in how the user content is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    WellnessChat,
    ReportAnalysis,
    DrugByName,
    DrugFromPdf,
}

impl Task {
    pub fn instruction(self) -> &'static str {
        match self {
            Task::WellnessChat => WELLNESS_INSTRUCTION,
            Task::ReportAnalysis => REPORT_INSTRUCTION,
            Task::DrugByName | Task::DrugFromPdf => DRUG_INSTRUCTION,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Task::WellnessChat => "wellness_chat",
            Task::ReportAnalysis => "report_analysis",
            Task::DrugByName => "drug_by_name",
            Task::DrugFromPdf => "drug_from_pdf",
        };
        f.write_str(s)
    }
}

const WELLNESS_INSTRUCTION: &str = r#"Sei un coach virtuale del benessere mentale, empatico e non giudicante.
Rispondi sempre in italiano, con un tono caldo e incoraggiante.
Offri suggerimenti pratici e generali (tecniche di respirazione, routine del sonno, gestione dello stress, mindfulness).
Non formulare diagnosi, non prescrivere farmaci e non sostituirti a uno psicologo o a un medico.
Se l'utente esprime pensieri di autolesionismo o di suicidio, invitalo con gentilezza a contattare subito il 112 o il Telefono Amico (02 2327 2327).
Mantieni le risposte concise: al massimo cinque paragrafi brevi o un elenco puntato."#;

const REPORT_INSTRUCTION: &str = r#"Sei un assistente che aiuta i pazienti a comprendere i propri referti medici.
Ricevi il testo estratto da un referto. Rispondi sempre in italiano.
1. Riassumi il contenuto con parole semplici, evitando il gergo tecnico o spiegandolo quando è indispensabile.
2. Elenca i valori fuori dai range di riferimento indicati nel documento, se presenti, senza interpretazioni cliniche.
3. Suggerisci domande utili da porre al proprio medico.
Non formulare diagnosi e non proporre terapie. Ricorda che solo il medico curante può interpretare il referto."#;

const DRUG_INSTRUCTION: &str = r#"Sei un assistente che fornisce informazioni generali sui farmaci. Rispondi sempre in italiano.
Per il farmaco indicato descrivi: principio attivo, a cosa serve in generale, effetti collaterali comuni, principali avvertenze e interazioni note.
Se viene fornito un contesto estratto da un documento, usalo come fonte principale.
Non indicare dosaggi personalizzati e non suggerire di iniziare, modificare o sospendere una terapia.
Se il farmaco non è riconosciuto, dillo chiaramente invece di inventare informazioni."#;
