mod test_websocket_round_trip;
