//! Mapbox Vector Tile command-stream decoding: `MoveTo`/`LineTo`/`ClosePath`
//! opcodes with zigzag-delta-encoded parameters, per the MVT 2.1 spec.

const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;
const CMD_CLOSE_PATH: u32 = 7;

#[inline]
fn zigzag(n: u32) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Decode a packed geometry command stream into its constituent parts: one
/// `Vec<(x, y)>` per `MoveTo`-delimited part (a ring for polygons, a line
/// for line-strings, a singleton-or-multi point list for points).
/// `ClosePath` carries no parameters and is otherwise a no-op here since
/// ear-cut triangulation doesn't need an explicit closing vertex.
pub fn decode_commands(geom: &[u32]) -> Vec<Vec<(i64, i64)>> {
    let mut parts = Vec::new();
    let mut current: Vec<(i64, i64)> = Vec::new();
    let mut cursor = 0usize;
    let (mut x, mut y) = (0i64, 0i64);

    while cursor < geom.len() {
        let header = geom[cursor];
        cursor += 1;
        let id = header & 0x7;
        let count = (header >> 3) as usize;

        match id {
            CMD_MOVE_TO => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
                for _ in 0..count {
                    if cursor + 1 >= geom.len() {
                        break;
                    }
                    x += zigzag(geom[cursor]);
                    y += zigzag(geom[cursor + 1]);
                    cursor += 2;
                    current.push((x, y));
                }
            }
            CMD_LINE_TO => {
                for _ in 0..count {
                    if cursor + 1 >= geom.len() {
                        break;
                    }
                    x += zigzag(geom[cursor]);
                    y += zigzag(geom[cursor + 1]);
                    cursor += 2;
                    current.push((x, y));
                }
            }
            CMD_CLOSE_PATH => {}
            _ => break,
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_simple_triangle_ring() {
        // MoveTo(3,6), LineTo(8,12) twice then a close: a standard MVT
        // triangle command-stream encoding.
        let geom = vec![9, 6, 12, 18, 10, 12, 24, 44, 15];
        let parts = decode_commands(&geom);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0][0], (3, 6));
    }

    #[test]
    fn multiple_move_tos_produce_separate_parts() {
        // Two single-point MoveTo parts (a MultiPoint).
        let geom = vec![(1 << 3) | 1, 4, 4, (1 << 3) | 1, 2, 2];
        let parts = decode_commands(&geom);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], vec![(2, 2)]);
        assert_eq!(parts[1], vec![(3, 3)]);
    }

    #[test]
    fn truncated_stream_does_not_panic() {
        let geom = vec![9, 6];
        let parts = decode_commands(&geom);
        assert!(parts.len() <= 1);
    }
}
