use crate::debug_hooks;

/// Longest frame the decoder will buffer. A real tick is a few dozen bytes.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Reassembles newline-delimited frames from arbitrarily split byte chunks.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    /// bytes of `buf` already known to hold no newline
    scanned: usize,
    max_frame: usize,
    /// skipping the rest of an oversized frame
    discarding: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_frame(MAX_FRAME_BYTES)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            max_frame: max_frame.max(1),
            discarding: false,
        }
    }

    /// Feed one chunk; returns every frame it completed. A trailing partial
    /// frame stays buffered until a later chunk terminates it. Unterminated
    /// data past the frame limit is dropped up to the next newline.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(off) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + off;
            if self.discarding {
                self.discarding = false;
            } else if let Some(frame) = clean(&self.buf[start..end]) {
                frames.push(frame);
            }
            start = end + 1;
            self.scanned = start;
        }
        self.buf.drain(..start);
        self.scanned = self.buf.len();

        if self.buf.len() > self.max_frame {
            if !self.discarding {
                let preview = String::from_utf8_lossy(&self.buf[..self.buf.len().min(64)]);
                debug_hooks::log_malformed(&preview, "frame too long");
                self.discarding = true;
            }
            self.buf.clear();
            self.scanned = 0;
        }
        frames
    }

    /// Whatever is left once the stream ends.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) {
            return None;
        }
        clean(&rest)
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn clean(line: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Split a websocket text message that may carry several frames.
pub fn split_message(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_frames_are_held_back() {
        let mut dec = FrameDecoder::new();
        assert!(dec.push(b"[1000,150").is_empty());
        assert_eq!(dec.pending(), 9);
        let frames = dec.push(b"00]\n[1001,");
        assert_eq!(frames, vec!["[1000,15000]".to_string()]);
        let frames = dec.push(b"15500]\r\n\n");
        assert_eq!(frames, vec!["[1001,15500]".to_string()]);
        assert_eq!(dec.pending(), 0);
    }

    #[test]
    fn finish_flushes_unterminated_tail() {
        let mut dec = FrameDecoder::new();
        dec.push(b"[1,2]\n[3,4]");
        assert_eq!(dec.finish().as_deref(), Some("[3,4]"));
        assert_eq!(dec.finish(), None);
    }

    #[test]
    fn oversized_frame_is_dropped_through_its_newline() {
        let mut dec = FrameDecoder::with_max_frame(16);
        assert_eq!(dec.push(b"[1,2]\n[99999999999"), vec!["[1,2]".to_string()]);
        assert!(dec.push(b"99999999999").is_empty());
        assert_eq!(dec.pending(), 0);
        assert!(dec.push(b"9999]").is_empty());
        assert_eq!(dec.push(b"999]\n[3,4]\n"), vec!["[3,4]".to_string()]);
        assert_eq!(dec.finish(), None);
    }

    #[test]
    fn oversized_tail_is_not_flushed() {
        let mut dec = FrameDecoder::with_max_frame(4);
        assert!(dec.push(b"[1000,").is_empty());
        assert_eq!(dec.pending(), 0);
        assert_eq!(dec.finish(), None);
        assert_eq!(dec.push(b"[1,2]\n"), vec!["[1,2]".to_string()]);
    }

    #[test]
    fn message_splitting_skips_blanks() {
        let parts: Vec<&str> = split_message("[1,2]\n\n [3,4] \r\n").collect();
        assert_eq!(parts, vec!["[1,2]", "[3,4]"]);
    }
}
