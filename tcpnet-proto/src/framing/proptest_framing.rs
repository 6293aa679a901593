//! Property tests for message framing.
//!
//! Reassembly must not depend on where the network happens to split the
//! stream: feeding bytes in arbitrary chunks has to yield the same messages
//! as feeding them all at once.

#[cfg(test)]
mod tests {
    use super::super::*;
    use bytes::Bytes;
    use proptest::prelude::*;

    /// Split `data` at the given cut points (taken modulo the length).
    fn chunks(data: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
        if data.is_empty() {
            return vec![Vec::new()];
        }
        let mut points: Vec<usize> = cuts.iter().map(|c| c % data.len()).collect();
        points.push(0);
        points.push(data.len());
        points.sort_unstable();
        points.dedup();
        points
            .windows(2)
            .map(|w| data[w[0]..w[1]].to_vec())
            .collect()
    }

    fn feed(framer: &dyn MessageFramer, pieces: &[Vec<u8>]) -> Vec<Bytes> {
        pieces.iter().flat_map(|piece| framer.unframe(piece)).collect()
    }

    fn arbitrary_length_type() -> impl Strategy<Value = LengthType> {
        prop::sample::select(vec![
            LengthType::U8,
            LengthType::U16,
            LengthType::U32,
            LengthType::U64,
        ])
    }

    fn arbitrary_endianness() -> impl Strategy<Value = Endianness> {
        prop::sample::select(vec![Endianness::Big, Endianness::Little])
    }

    proptest! {
        #[test]
        fn length_prefixed_chunk_boundary_independence(
            payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..200), 0..8),
            length_type in arbitrary_length_type(),
            endianness in arbitrary_endianness(),
            trailing in prop::collection::vec(any::<u8>(), 0..12),
            cuts in prop::collection::vec(any::<usize>(), 0..20),
        ) {
            let encoder = LengthPrefixedFramer::new(length_type, endianness);
            let mut stream = Vec::new();
            for payload in &payloads {
                stream.extend_from_slice(&encoder.frame(payload).unwrap());
            }
            stream.extend_from_slice(&trailing);

            let whole = LengthPrefixedFramer::new(length_type, endianness);
            let expected = whole.unframe(&stream);

            let chunked = LengthPrefixedFramer::new(length_type, endianness);
            let actual = feed(&chunked, &chunks(&stream, &cuts));

            prop_assert_eq!(&actual, &expected);
            prop_assert_eq!(chunked.pending_len(), whole.pending_len());
            prop_assert!(actual.len() >= payloads.len());
            for (got, want) in actual.iter().zip(&payloads) {
                prop_assert_eq!(&got[..], &want[..]);
            }
        }

        #[test]
        fn length_prefixed_byte_at_a_time(
            payload in prop::collection::vec(any::<u8>(), 0..300),
            endianness in arbitrary_endianness(),
        ) {
            let framer = LengthPrefixedFramer::new(LengthType::U16, endianness);
            let framed = framer.frame(&payload).unwrap();
            let pieces: Vec<Vec<u8>> = framed.iter().map(|b| vec![*b]).collect();
            let out = feed(&framer, &pieces);
            prop_assert_eq!(out.len(), 1);
            prop_assert_eq!(&out[0][..], &payload[..]);
        }

        #[test]
        fn delimiter_chunk_boundary_independence(
            lines in prop::collection::vec("[a-z ]{0,30}", 0..10),
            cuts in prop::collection::vec(any::<usize>(), 0..20),
        ) {
            let stream: Vec<u8> = lines
                .iter()
                .flat_map(|line| format!("{line}\r\n").into_bytes())
                .collect();

            let framer = DelimiterFramer::new(b"\r\n".to_vec());
            let actual = feed(&framer, &chunks(&stream, &cuts));

            prop_assert_eq!(actual.len(), lines.len());
            for (got, want) in actual.iter().zip(&lines) {
                prop_assert_eq!(&got[..], want.as_bytes());
            }
            prop_assert_eq!(framer.pending_len(), 0);
        }
    }
}
