// Integration tests for relay-api-derive live in tests/
