//! Opus Encoder/Decoder hinter einem Codec-Trait
//!
//! Kapselt audiopus und stellt eine i16-PCM basierte API bereit. Der
//! Codec ist pro Frame zustandslos aufrufbar; Opus-Parameter sind
//! jederzeit setzbar und wirken ab dem naechsten Frame.

use audiopus::{
    coder::{Decoder, Encoder},
    Application, Bitrate, Channels, SampleRate,
};
use tracing::debug;

use voicelink_core::types::AudioFormat;

use crate::error::{AudioError, AudioResult};

/// Maximale Groesse eines kodierten Opus-Pakets in Bytes
pub const MAX_PAKET_GROESSE: usize = 4000;

// Opus-Encoder-CTLs die audiopus 0.2 nicht als Methode anbietet
const OPUS_SET_PACKET_LOSS_PERC: i32 = 4014;
const OPUS_SET_DTX: i32 = 4016;
const OPUS_SET_SIGNAL: i32 = 4024;
const OPUS_SET_LSB_DEPTH: i32 = 4036;

const OPUS_AUTO: i32 = -1000;
const OPUS_SIGNAL_VOICE: i32 = 3001;
const OPUS_SIGNAL_MUSIC: i32 = 3002;

// ---------------------------------------------------------------------------
// Codec-Trait
// ---------------------------------------------------------------------------

/// Encoder/Decoder-Paar fuer einen festen `AudioFormat`
///
/// `decode` gibt die Anzahl der dekodierten Samples PRO KANAL zurueck;
/// der Ausgabepuffer muss mindestens `input_frame_groesse() * channels`
/// Samples fassen.
pub trait AudioCodec: Send {
    /// Kodiert exakt einen PCM-Frame in `ziel`, gibt die Byte-Anzahl zurueck
    fn encode(&mut self, pcm: &[i16], ziel: &mut [u8]) -> AudioResult<usize>;

    /// Dekodiert ein Opus-Paket nach PCM, gibt Samples pro Kanal zurueck
    fn decode(&mut self, daten: &[u8], pcm: &mut [i16]) -> AudioResult<usize>;

    /// Setzt den Codec-Zustand zurueck (z. B. nach einem Stream-Abriss)
    fn zuruecksetzen(&mut self) -> AudioResult<()>;

    /// Samples pro Frame und Kanal des konfigurierten Formats
    fn input_frame_groesse(&self) -> usize;

    /// Obergrenze fuer die Groesse eines kodierten Pakets
    fn max_output_groesse(&self) -> usize;

    /// Konfiguriertes Format
    fn format(&self) -> AudioFormat;
}

// ---------------------------------------------------------------------------
// Opus-Einstellungen
// ---------------------------------------------------------------------------

/// Signal-Typ-Hinweis fuer den Opus-Encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalTyp {
    Auto,
    Sprache,
    Musik,
}

impl SignalTyp {
    fn als_ctl_wert(&self) -> i32 {
        match self {
            SignalTyp::Auto => OPUS_AUTO,
            SignalTyp::Sprache => OPUS_SIGNAL_VOICE,
            SignalTyp::Musik => OPUS_SIGNAL_MUSIC,
        }
    }
}

/// Opus-Parameter; `None` laesst den jeweiligen Wert unveraendert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpusEinstellungen {
    /// Ziel-Bitrate in bit/s
    pub bitrate_bps: Option<i32>,
    /// Komplexitaet 0–10
    pub complexity: Option<u8>,
    /// Variable Bitrate
    pub vbr: Option<bool>,
    /// Inband Forward Error Correction
    pub fec: Option<bool>,
    /// Discontinuous Transmission
    pub dtx: Option<bool>,
    /// Signal-Typ-Hinweis
    pub signal: Option<SignalTyp>,
    /// Erwarteter Paketverlust in Prozent (0–100)
    pub packet_loss_perc: Option<u8>,
    /// LSB-Tiefe (8–24)
    pub lsb_depth: Option<u8>,
}

impl OpusEinstellungen {
    /// Uebernimmt gesetzte Felder aus `neu` in `self`
    fn uebernehmen(&mut self, neu: &OpusEinstellungen) {
        macro_rules! merge {
            ($feld:ident) => {
                if neu.$feld.is_some() {
                    self.$feld = neu.$feld;
                }
            };
        }
        merge!(bitrate_bps);
        merge!(complexity);
        merge!(vbr);
        merge!(fec);
        merge!(dtx);
        merge!(signal);
        merge!(packet_loss_perc);
        merge!(lsb_depth);
    }

    /// Validiert die Wertebereiche
    pub fn validieren(&self) -> AudioResult<()> {
        if let Some(c) = self.complexity {
            if c > 10 {
                return Err(AudioError::UngueltigerParameter(format!(
                    "Komplexitaet muss 0–10 sein (war: {})",
                    c
                )));
            }
        }
        if let Some(p) = self.packet_loss_perc {
            if p > 100 {
                return Err(AudioError::UngueltigerParameter(format!(
                    "Paketverlust muss 0–100 sein (war: {})",
                    p
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// OpusCodec
// ---------------------------------------------------------------------------

/// Opus-Codec: kodiert und dekodiert i16-PCM (VoIP-Modus)
pub struct OpusCodec {
    encoder: Encoder,
    decoder: Decoder,
    format: AudioFormat,
    frame_groesse: usize,
    einstellungen: OpusEinstellungen,
}

impl OpusCodec {
    /// Erstellt ein Encoder/Decoder-Paar fuer das gegebene Format
    pub fn neu(format: AudioFormat) -> AudioResult<Self> {
        format
            .validieren()
            .map_err(AudioError::UngueltigerParameter)?;
        if !matches!(format.frame_duration_ms, 10 | 20 | 40 | 60) {
            return Err(AudioError::FormatNichtUnterstuetzt(format!(
                "Opus-Frame-Dauer muss 10/20/40/60 ms sein (war: {})",
                format.frame_duration_ms
            )));
        }

        let sample_rate = rate_zu_audiopus(format.sample_rate)?;
        let channels = kanaele_zu_audiopus(format.channels);

        let encoder = Encoder::new(sample_rate, channels, Application::Voip)
            .map_err(|e| AudioError::InitialisierungFehlgeschlagen(e.to_string()))?;
        let decoder = Decoder::new(sample_rate, channels)
            .map_err(|e| AudioError::InitialisierungFehlgeschlagen(e.to_string()))?;

        let frame_groesse = format.samples_pro_frame();

        debug!(
            "OpusCodec erstellt: {}Hz {}ch frame_groesse={}",
            format.sample_rate, format.channels, frame_groesse
        );

        Ok(Self {
            encoder,
            decoder,
            format,
            frame_groesse,
            einstellungen: OpusEinstellungen::default(),
        })
    }

    /// Wendet Opus-Parameter auf den laufenden Encoder an
    ///
    /// Die Werte wirken ab dem naechsten Frame und ueberleben
    /// `zuruecksetzen`.
    pub fn einstellungen_anwenden(&mut self, neu: &OpusEinstellungen) -> AudioResult<()> {
        neu.validieren()?;
        self.einstellungen.uebernehmen(neu);
        Self::auf_encoder_anwenden(&mut self.encoder, &self.einstellungen)
    }

    /// Gibt die zuletzt angewendeten Einstellungen zurueck
    pub fn einstellungen(&self) -> &OpusEinstellungen {
        &self.einstellungen
    }

    fn auf_encoder_anwenden(
        encoder: &mut Encoder,
        einstellungen: &OpusEinstellungen,
    ) -> AudioResult<()> {
        let codec_fehler = |e: audiopus::Error| AudioError::UngueltigerParameter(e.to_string());

        if let Some(bps) = einstellungen.bitrate_bps {
            encoder
                .set_bitrate(Bitrate::BitsPerSecond(bps))
                .map_err(codec_fehler)?;
        }
        if let Some(c) = einstellungen.complexity {
            encoder.set_complexity(c).map_err(codec_fehler)?;
        }
        if let Some(vbr) = einstellungen.vbr {
            encoder.set_vbr(vbr).map_err(codec_fehler)?;
        }
        if let Some(fec) = einstellungen.fec {
            encoder.set_inband_fec(fec).map_err(codec_fehler)?;
        }
        // audiopus 0.2 bietet fuer die folgenden Parameter keine Methoden;
        // sie werden ueber Encoder-CTLs gesetzt
        if let Some(dtx) = einstellungen.dtx {
            encoder
                .set_encoder_ctl_request(OPUS_SET_DTX, i32::from(dtx))
                .map_err(codec_fehler)?;
        }
        if let Some(signal) = einstellungen.signal {
            encoder
                .set_encoder_ctl_request(OPUS_SET_SIGNAL, signal.als_ctl_wert())
                .map_err(codec_fehler)?;
        }
        if let Some(verlust) = einstellungen.packet_loss_perc {
            encoder
                .set_encoder_ctl_request(OPUS_SET_PACKET_LOSS_PERC, i32::from(verlust))
                .map_err(codec_fehler)?;
        }
        if let Some(tiefe) = einstellungen.lsb_depth {
            encoder
                .set_encoder_ctl_request(OPUS_SET_LSB_DEPTH, i32::from(tiefe))
                .map_err(codec_fehler)?;
        }
        Ok(())
    }
}

impl AudioCodec for OpusCodec {
    fn encode(&mut self, pcm: &[i16], ziel: &mut [u8]) -> AudioResult<usize> {
        let erwartet = self.frame_groesse * self.format.channels as usize;
        if pcm.len() != erwartet {
            return Err(AudioError::UngueltigerParameter(format!(
                "PCM-Frame muss {} Samples lang sein, war {}",
                erwartet,
                pcm.len()
            )));
        }
        if ziel.is_empty() {
            return Err(AudioError::PufferZuKlein {
                benoetigt: 1,
                vorhanden: 0,
            });
        }

        self.encoder
            .encode(pcm, ziel)
            .map_err(|e| AudioError::EncodingFehlgeschlagen(e.to_string()))
    }

    fn decode(&mut self, daten: &[u8], pcm: &mut [i16]) -> AudioResult<usize> {
        if daten.is_empty() {
            return Err(AudioError::DecodingFehlgeschlagen(
                "leere Nutzdaten".into(),
            ));
        }
        let benoetigt = self.frame_groesse * self.format.channels as usize;
        if pcm.len() < benoetigt {
            return Err(AudioError::PufferZuKlein {
                benoetigt,
                vorhanden: pcm.len(),
            });
        }

        self.decoder
            .decode(Some(daten), pcm, false)
            .map_err(|e| AudioError::DecodingFehlgeschlagen(e.to_string()))
    }

    fn zuruecksetzen(&mut self) -> AudioResult<()> {
        // Encoder und Decoder aus den gespeicherten Parametern neu aufbauen
        let sample_rate = rate_zu_audiopus(self.format.sample_rate)?;
        let channels = kanaele_zu_audiopus(self.format.channels);

        self.encoder = Encoder::new(sample_rate, channels, Application::Voip)
            .map_err(|e| AudioError::InitialisierungFehlgeschlagen(e.to_string()))?;
        self.decoder = Decoder::new(sample_rate, channels)
            .map_err(|e| AudioError::InitialisierungFehlgeschlagen(e.to_string()))?;

        Self::auf_encoder_anwenden(&mut self.encoder, &self.einstellungen)
    }

    fn input_frame_groesse(&self) -> usize {
        self.frame_groesse
    }

    fn max_output_groesse(&self) -> usize {
        MAX_PAKET_GROESSE
    }

    fn format(&self) -> AudioFormat {
        self.format
    }
}

// ---------------------------------------------------------------------------
// StubCodec
// ---------------------------------------------------------------------------

/// Durchreich-Codec fuer Tests: i16-PCM <-> Little-Endian-Bytes
pub struct StubCodec {
    format: AudioFormat,
}

impl StubCodec {
    pub fn neu(format: AudioFormat) -> Self {
        Self { format }
    }
}

impl AudioCodec for StubCodec {
    fn encode(&mut self, pcm: &[i16], ziel: &mut [u8]) -> AudioResult<usize> {
        let erwartet = self.format.samples_pro_frame_gesamt();
        if pcm.len() != erwartet {
            return Err(AudioError::UngueltigerParameter(format!(
                "PCM-Frame muss {} Samples lang sein, war {}",
                erwartet,
                pcm.len()
            )));
        }
        let benoetigt = pcm.len() * 2;
        if ziel.len() < benoetigt {
            return Err(AudioError::PufferZuKlein {
                benoetigt,
                vorhanden: ziel.len(),
            });
        }
        for (i, sample) in pcm.iter().enumerate() {
            ziel[i * 2..i * 2 + 2].copy_from_slice(&sample.to_le_bytes());
        }
        Ok(benoetigt)
    }

    fn decode(&mut self, daten: &[u8], pcm: &mut [i16]) -> AudioResult<usize> {
        if daten.is_empty() {
            return Err(AudioError::DecodingFehlgeschlagen(
                "leere Nutzdaten".into(),
            ));
        }
        let samples_gesamt = (daten.len() / 2).min(pcm.len());
        for i in 0..samples_gesamt {
            pcm[i] = i16::from_le_bytes([daten[i * 2], daten[i * 2 + 1]]);
        }
        Ok(samples_gesamt / self.format.channels as usize)
    }

    fn zuruecksetzen(&mut self) -> AudioResult<()> {
        Ok(())
    }

    fn input_frame_groesse(&self) -> usize {
        self.format.samples_pro_frame()
    }

    fn max_output_groesse(&self) -> usize {
        MAX_PAKET_GROESSE
    }

    fn format(&self) -> AudioFormat {
        self.format
    }
}

// ---------------------------------------------------------------------------
// Konvertierungs-Hilfsfunktionen
// ---------------------------------------------------------------------------

fn rate_zu_audiopus(rate: u32) -> AudioResult<SampleRate> {
    match rate {
        8000 => Ok(SampleRate::Hz8000),
        12000 => Ok(SampleRate::Hz12000),
        16000 => Ok(SampleRate::Hz16000),
        24000 => Ok(SampleRate::Hz24000),
        48000 => Ok(SampleRate::Hz48000),
        andere => Err(AudioError::FormatNichtUnterstuetzt(format!(
            "Abtastrate {} Hz",
            andere
        ))),
    }
}

fn kanaele_zu_audiopus(kanaele: u8) -> Channels {
    match kanaele {
        2 => Channels::Stereo,
        _ => Channels::Mono,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
