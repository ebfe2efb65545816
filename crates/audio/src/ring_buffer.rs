//! Ring-Buffer mit Mutex und Condition Variable
//!
//! Das einzige Puffer-Primitiv im Audio-Pfad: eine zirkulaere Queue mit
//! fester Kapazitaet, getrennten Lese-/Schreib-Indizes und einem
//! Belegungszaehler. Es gilt jederzeit
//! `belegt = (schreib_index - lese_index) mod kapazitaet`, wobei der
//! Zaehler den Voll/Leer-Fall eindeutig macht.
//!
//! ## Ueberlauf-Politik
//! Der Produzent verwirft bei Ueberlauf die NEUESTEN Daten und loggt eine
//! Warnung; der Konsument erzeugt bei Unterlauf Stille. Capture-Ueberlauf
//! bedeutet dass das Netz zu langsam ist – veraltete Samples zu behalten
//! waere schlimmer als sie zu verwerfen. Wiedergabe-Unterlauf muss
//! dagegen kontinuierliche Ausgabe liefern statt zu stocken.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::error::{AudioError, AudioResult};

// ---------------------------------------------------------------------------
// RingBuffer (nicht synchronisiert)
// ---------------------------------------------------------------------------

/// Zirkulaere Queue mit fester Kapazitaet
#[derive(Debug)]
pub struct RingBuffer<T> {
    buf: Vec<T>,
    kapazitaet: usize,
    lese_index: usize,
    schreib_index: usize,
    belegt: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Erstellt einen Buffer mit der gegebenen Kapazitaet (> 0)
    pub fn neu(kapazitaet: usize) -> Self {
        assert!(kapazitaet > 0, "Ring-Buffer-Kapazitaet muss > 0 sein");
        Self {
            buf: vec![T::default(); kapazitaet],
            kapazitaet,
            lese_index: 0,
            schreib_index: 0,
            belegt: 0,
        }
    }

    /// Kapazitaet in Elementen
    pub fn kapazitaet(&self) -> usize {
        self.kapazitaet
    }

    /// Aktuell belegte Elemente
    pub fn belegt(&self) -> usize {
        self.belegt
    }

    /// Freie Elemente
    pub fn frei(&self) -> usize {
        self.kapazitaet - self.belegt
    }

    pub fn ist_leer(&self) -> bool {
        self.belegt == 0
    }

    pub fn ist_voll(&self) -> bool {
        self.belegt == self.kapazitaet
    }

    /// Schreibt so viele Elemente wie Platz ist, gibt die Anzahl zurueck
    pub fn schreiben(&mut self, daten: &[T]) -> usize {
        let anzahl = daten.len().min(self.frei());
        for element in &daten[..anzahl] {
            self.buf[self.schreib_index] = *element;
            self.schreib_index = (self.schreib_index + 1) % self.kapazitaet;
        }
        self.belegt += anzahl;
        anzahl
    }

    /// Liest bis zu `ziel.len()` Elemente, gibt die Anzahl zurueck
    pub fn lesen(&mut self, ziel: &mut [T]) -> usize {
        let anzahl = ziel.len().min(self.belegt);
        for slot in ziel[..anzahl].iter_mut() {
            *slot = self.buf[self.lese_index];
            self.lese_index = (self.lese_index + 1) % self.kapazitaet;
        }
        self.belegt -= anzahl;
        anzahl
    }

    /// Setzt Lese-Index, Schreib-Index und Zaehler atomar zurueck
    pub fn leeren(&mut self) {
        self.lese_index = 0;
        self.schreib_index = 0;
        self.belegt = 0;
    }

    /// Prueft die Index-Invariante (nur fuer Tests und Debug-Assertions)
    pub fn invariante_gilt(&self) -> bool {
        let diff = (self.schreib_index + self.kapazitaet - self.lese_index) % self.kapazitaet;
        self.belegt <= self.kapazitaet
            && (diff == self.belegt % self.kapazitaet)
    }
}

// ---------------------------------------------------------------------------
// SyncRingBuffer
// ---------------------------------------------------------------------------

/// Thread-sicherer Ring-Buffer mit eigener Mutex und Condition Variable
///
/// Produzent und Konsument laufen auf verschiedenen Threads (Host-Callback
/// gegen Benutzer-Thread). Blockierendes Lesen wartet auf der Condition
/// Variable bis genug Daten vorliegen oder die Frist ablaeuft.
pub struct SyncRingBuffer<T> {
    inner: Mutex<RingBuffer<T>>,
    cv: Condvar,
}

impl<T: Copy + Default> SyncRingBuffer<T> {
    /// Erstellt einen synchronisierten Buffer
    pub fn neu(kapazitaet: usize) -> Self {
        Self {
            inner: Mutex::new(RingBuffer::neu(kapazitaet)),
            cv: Condvar::new(),
        }
    }

    /// Produzenten-Seite: schreibt was passt und verwirft den Ueberhang
    ///
    /// Gibt die Anzahl verworfener Elemente zurueck; pro Aufruf wird
    /// hoechstens eine Warnung geloggt.
    pub fn schreiben_verwerfend(&self, daten: &[T]) -> usize {
        let verworfen = {
            let mut rb = self.inner.lock();
            let geschrieben = rb.schreiben(daten);
            daten.len() - geschrieben
        };
        if verworfen > 0 {
            warn!(verworfen, "Ring-Buffer voll, neueste Samples verworfen");
        }
        self.cv.notify_one();
        verworfen
    }

    /// Nicht-blockierendes Schreiben: alles oder gar nichts
    ///
    /// # Fehler
    /// `PufferVoll` wenn nicht genug Platz fuer den gesamten Block ist;
    /// der Buffer bleibt dann unveraendert.
    pub fn schreiben_alles(&self, daten: &[T]) -> AudioResult<()> {
        {
            let mut rb = self.inner.lock();
            if rb.frei() < daten.len() {
                return Err(AudioError::PufferVoll);
            }
            rb.schreiben(daten);
        }
        self.cv.notify_one();
        Ok(())
    }

    /// Blockierendes Lesen von exakt `ziel.len()` Elementen
    ///
    /// Wartet auf der Condition Variable bis genug Daten vorliegen.
    ///
    /// # Fehler
    /// `Zeitlimit` wenn die Frist ablaeuft bevor genug Daten da sind.
    pub fn lesen_blockierend(&self, ziel: &mut [T], frist: Duration) -> AudioResult<()> {
        let ende = Instant::now() + frist;
        let mut rb = self.inner.lock();
        while rb.belegt() < ziel.len() {
            if self.cv.wait_until(&mut rb, ende).timed_out() && rb.belegt() < ziel.len() {
                return Err(AudioError::Zeitlimit);
            }
        }
        rb.lesen(ziel);
        Ok(())
    }

    /// Konsumenten-Seite ohne Blockieren: liest was da ist, gibt die
    /// Anzahl zurueck (der Aufrufer fuellt den Rest mit Stille)
    pub fn lesen_verfuegbar(&self, ziel: &mut [T]) -> usize {
        self.inner.lock().lesen(ziel)
    }

    /// Leert den Buffer und weckt Wartende
    pub fn leeren(&self) {
        self.inner.lock().leeren();
        self.cv.notify_all();
    }

    /// Weckt alle auf der Condition Variable Wartenden (fuer Shutdown)
    pub fn aufwecken(&self) {
        self.cv.notify_all();
    }

    pub fn belegt(&self) -> usize {
        self.inner.lock().belegt()
    }

    pub fn kapazitaet(&self) -> usize {
        self.inner.lock().kapazitaet()
    }

    pub fn ist_leer(&self) -> bool {
        self.inner.lock().ist_leer()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn leerer_buffer() {
        let rb = RingBuffer::<i16>::neu(8);
        assert_eq!(rb.kapazitaet(), 8);
        assert_eq!(rb.belegt(), 0);
        assert!(rb.ist_leer());
        assert!(!rb.ist_voll());
        assert!(rb.invariante_gilt());
    }

    #[test]
    fn schreiben_und_lesen() {
        let mut rb = RingBuffer::<i16>::neu(8);
        assert_eq!(rb.schreiben(&[1, 2, 3]), 3);
        assert_eq!(rb.belegt(), 3);
        assert!(rb.invariante_gilt());

        let mut ziel = [0i16; 3];
        assert_eq!(rb.lesen(&mut ziel), 3);
        assert_eq!(ziel, [1, 2, 3]);
        assert!(rb.ist_leer());
        assert!(rb.invariante_gilt());
    }

    #[test]
    fn wrap_around() {
        let mut rb = RingBuffer::<i16>::neu(4);
        rb.schreiben(&[1, 2, 3]);
        let mut ziel = [0i16; 2];
        rb.lesen(&mut ziel);
        // Indizes stehen jetzt mitten im Buffer; der naechste Block wickelt um
        assert_eq!(rb.schreiben(&[4, 5, 6]), 3);
        assert!(rb.ist_voll());
        assert!(rb.invariante_gilt());

        let mut ziel = [0i16; 4];
        assert_eq!(rb.lesen(&mut ziel), 4);
        assert_eq!(ziel, [3, 4, 5, 6]);
        assert!(rb.invariante_gilt());
    }

    #[test]
    fn ueberlauf_schreibt_nur_was_passt() {
        let mut rb = RingBuffer::<i16>::neu(4);
        assert_eq!(rb.schreiben(&[1, 2, 3, 4, 5, 6]), 4);
        assert!(rb.ist_voll());
        // Die aeltesten Daten bleiben erhalten, die neuesten wurden verworfen
        let mut ziel = [0i16; 4];
        rb.lesen(&mut ziel);
        assert_eq!(ziel, [1, 2, 3, 4]);
    }

    #[test]
    fn leeren_setzt_alles_zurueck() {
        let mut rb = RingBuffer::<i16>::neu(4);
        rb.schreiben(&[1, 2, 3]);
        rb.leeren();
        assert!(rb.ist_leer());
        assert_eq!(rb.belegt(), 0);
        assert!(rb.invariante_gilt());
    }

    #[test]
    fn invariante_unter_vielen_operationen() {
        let mut rb = RingBuffer::<i16>::neu(7);
        let mut ziel = [0i16; 5];
        for i in 0..50 {
            rb.schreiben(&[i as i16; 3]);
            assert!(rb.invariante_gilt());
            rb.lesen(&mut ziel[..(i % 4) + 1]);
            assert!(rb.invariante_gilt());
            assert!(rb.belegt() <= rb.kapazitaet());
        }
    }

    #[test]
    fn sync_verwerfend_zaehlt_verworfene() {
        let rb = SyncRingBuffer::<i16>::neu(4);
        assert_eq!(rb.schreiben_verwerfend(&[1, 2, 3]), 0);
        // Nur noch 1 Platz frei: 2 von 3 werden verworfen
        assert_eq!(rb.schreiben_verwerfend(&[4, 5, 6]), 2);
        assert_eq!(rb.belegt(), 4);

        // Die Frames vor dem Ueberlauf sind weiterhin lesbar
        let mut ziel = [0i16; 4];
        assert_eq!(rb.lesen_verfuegbar(&mut ziel), 4);
        assert_eq!(ziel, [1, 2, 3, 4]);
    }

    #[test]
    fn sync_alles_oder_nichts() {
        let rb = SyncRingBuffer::<i16>::neu(4);
        rb.schreiben_alles(&[1, 2]).unwrap();
        // 3 Elemente passen nicht mehr: Fehler, Buffer unveraendert
        assert!(matches!(
            rb.schreiben_alles(&[3, 4, 5]),
            Err(AudioError::PufferVoll)
        ));
        assert_eq!(rb.belegt(), 2);
    }

    #[test]
    fn sync_blockierendes_lesen_zeitlimit() {
        let rb = SyncRingBuffer::<i16>::neu(8);
        let mut ziel = [0i16; 4];
        let start = Instant::now();
        let result = rb.lesen_blockierend(&mut ziel, Duration::from_millis(50));
        assert!(matches!(result, Err(AudioError::Zeitlimit)));
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn sync_blockierendes_lesen_wird_geweckt() {
        let rb = Arc::new(SyncRingBuffer::<i16>::neu(8));
        let rb2 = Arc::clone(&rb);

        let schreiber = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            rb2.schreiben_verwerfend(&[7, 8, 9, 10]);
        });

        let mut ziel = [0i16; 4];
        rb.lesen_blockierend(&mut ziel, Duration::from_secs(1))
            .expect("Lesen muss nach dem Schreiben aufwachen");
        assert_eq!(ziel, [7, 8, 9, 10]);
        schreiber.join().unwrap();
    }

    #[test]
    fn sync_leeren_weckt_wartende() {
        let rb = Arc::new(SyncRingBuffer::<i16>::neu(8));
        rb.schreiben_verwerfend(&[1, 2]);
        rb.leeren();
        assert!(rb.ist_leer());
    }
}
