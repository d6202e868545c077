use relay_api::{DeserializeError, Message, Packet};

// Named fields of mixed widths
#[derive(Message, Debug, PartialEq)]
#[message(id = 16)]
struct PlayerMove {
    player: u32,
    dx: i16,
    dy: i16,
    running: bool,
}

// Tuple struct
#[derive(Message, Debug, PartialEq)]
#[message(id = 17)]
struct Tick(u64);

// Unit struct, zero-sized schema
#[derive(Message, Debug, PartialEq)]
#[message(id = 18)]
struct Flush;

// Byte arrays and chars
#[derive(Message, Debug, PartialEq)]
#[message(id = 19)]
struct Tagged {
    tag: [u8; 4],
    marker: char,
    weight: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ids() {
        assert_eq!(PlayerMove::TYPE_ID, 16);
        assert_eq!(Tick::TYPE_ID, 17);
        assert_eq!(Flush::TYPE_ID, 18);
        assert_eq!(Tagged::TYPE_ID, 19);
    }

    #[test]
    fn test_wire_sizes() {
        assert_eq!(PlayerMove::WIRE_SIZE, 4 + 2 + 2 + 1);
        assert_eq!(Tick::WIRE_SIZE, 8);
        assert_eq!(Flush::WIRE_SIZE, 0);
        assert_eq!(Tagged::WIRE_SIZE, 4 + 4 + 8);
    }

    #[test]
    fn test_named_struct_layout() {
        let packet = PlayerMove {
            player: 7,
            dx: -1,
            dy: 2,
            running: true,
        }
        .serialize();

        assert_eq!(packet.type_id, 16);
        assert_eq!(
            packet.payload,
            vec![7, 0, 0, 0, 0xff, 0xff, 2, 0, 1],
            "fields are encoded little-endian in declaration order"
        );

        let decoded = PlayerMove::deserialize(packet).unwrap();
        assert_eq!(
            decoded,
            PlayerMove {
                player: 7,
                dx: -1,
                dy: 2,
                running: true,
            }
        );
    }

    #[test]
    fn test_tuple_struct() {
        let decoded = Tick::deserialize(Tick(u64::MAX - 1).serialize()).unwrap();
        assert_eq!(decoded, Tick(u64::MAX - 1));
    }

    #[test]
    fn test_unit_struct() {
        let packet = Flush.serialize();
        assert!(packet.is_empty());
        assert_eq!(Flush::deserialize(packet).unwrap(), Flush);
    }

    #[test]
    fn test_arrays_and_chars() {
        let original = Tagged {
            tag: *b"RLAY",
            marker: '✓',
            weight: 0.25,
        };
        let decoded = Tagged::deserialize(original.serialize()).unwrap();
        assert_eq!(decoded.tag, *b"RLAY");
        assert_eq!(decoded.marker, '✓');
        assert_eq!(decoded.weight, 0.25);
    }

    #[test]
    fn test_truncated_payload() {
        let err = PlayerMove::deserialize(Packet::new(16, vec![0; 8])).unwrap_err();
        assert!(matches!(
            err,
            DeserializeError::Truncated { type_id: 16, expected: 9, actual: 8 }
        ));
    }

    #[test]
    fn test_wrong_type_id() {
        let err = Tick::deserialize(Packet::new(16, vec![0; 8])).unwrap_err();
        assert!(matches!(err, DeserializeError::WrongType { expected: 17, actual: 16 }));
    }

    #[test]
    fn test_invalid_field_value() {
        let mut payload = vec![0; PlayerMove::WIRE_SIZE];
        payload[8] = 5;
        let err = PlayerMove::deserialize(Packet::new(16, payload)).unwrap_err();
        assert!(matches!(err, DeserializeError::InvalidValue { type_name: "bool", .. }));
    }

    #[test]
    fn test_message_type_name() {
        assert_eq!(Flush.message_type(), "message_tests::Flush");
    }
}
