use crate::model::{EmotionRecord, Metric, Metrics};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Emotion {
    Assustado,
    Bravo,
    Nervoso,
    Cansado,
    Triste,
    Neutro,
    Feliz,
}

impl Emotion {
    pub fn label(self) -> &'static str {
        match self {
            Emotion::Assustado => "ASSUSTADO",
            Emotion::Bravo => "BRAVO",
            Emotion::Nervoso => "NERVOSO",
            Emotion::Cansado => "CANSADO",
            Emotion::Triste => "TRISTE",
            Emotion::Neutro => "NEUTRO",
            Emotion::Feliz => "FELIZ",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Emotion::Assustado => "#800080",
            Emotion::Bravo => "#00FF00",
            Emotion::Nervoso => "#FF0000",
            Emotion::Cansado => "#808080",
            Emotion::Triste => "#0000FF",
            Emotion::Neutro => "#FFD700",
            Emotion::Feliz => "#FFA500",
        }
    }

    pub fn image_key(self) -> &'static str {
        match self {
            Emotion::Assustado => "body_roxo_assustado.png",
            Emotion::Bravo => "body_verde_bravo.png",
            Emotion::Nervoso => "body_vermelho_nervoso.png",
            Emotion::Cansado => "body_cinza_cansado.png",
            Emotion::Triste => "body_azul_triste.png",
            Emotion::Neutro => "body_amarelo_neutro.png",
            Emotion::Feliz => "body_laranja_feliz.png",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// First matching rule wins. The order is part of observable behavior.
pub fn classify(m: &Metrics) -> Emotion {
    let energy = m.value_or_full(Metric::Energy);
    let hunger = m.value_or_full(Metric::Hunger);
    let sleep = m.value_or_full(Metric::Sleep);
    let stress = m.value_or_full(Metric::Stress);

    if energy < 30.0 {
        return Emotion::Assustado;
    }
    if hunger < 45.0 {
        return Emotion::Bravo;
    }
    if stress > 80.0 {
        return Emotion::Nervoso;
    }
    if sleep < 25.0 {
        return Emotion::Cansado;
    }
    if energy < 40.0 {
        return Emotion::Triste;
    }
    if energy <= 70.0 {
        return Emotion::Neutro;
    }
    Emotion::Feliz
}

/// History is written on change only: a record is due when there is none
/// yet or the newest one carries a different label.
pub fn needs_record(last: Option<&EmotionRecord>, next: Emotion) -> bool {
    last.map_or(true, |r| r.emotion != next)
}
